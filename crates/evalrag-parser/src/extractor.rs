//! Text extraction from remote or local documents
//!
//! A document reference is either a URL or a local path. Remote documents are
//! downloaded into a scoped temporary file that is removed once parsing is
//! done, whether parsing succeeded or not. A local path that no longer exists
//! is recovered from the configured storage base URL by file name.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use evalrag_core::StorageConfig;
use reqwest::Client;
use tempfile::NamedTempFile;

use crate::{FileType, ParsedDocument, ParserError, ParserRegistry, Result};

/// Where a document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Remote(String),
    Local(PathBuf),
}

impl DocumentSource {
    /// Classify a reference: anything starting with `<scheme>://` is remote
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if has_scheme(reference) {
            Self::Remote(reference.to_string())
        } else {
            Self::Local(PathBuf::from(reference))
        }
    }
}

fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Last path segment of a URL, without query or fragment
fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let (_, after_scheme) = path.split_once("://")?;
    let (_, resource) = after_scheme.split_once('/')?;
    resource.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Something that turns a document reference into plain text
#[async_trait]
pub trait TextExtraction: Send + Sync {
    async fn extract_text(&self, reference: &str) -> evalrag_core::Result<String>;
}

/// Resolves document references and parses them into text
pub struct TextExtractor {
    client: Client,
    registry: Arc<ParserRegistry>,
    fallback_base_url: Option<String>,
    temp_dir: Option<PathBuf>,
}

impl TextExtractor {
    /// Create an extractor with the default parsers
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            registry: Arc::new(ParserRegistry::with_defaults()),
            fallback_base_url: None,
            temp_dir: None,
        }
    }

    /// Create from config
    pub fn from_config(config: &StorageConfig) -> Self {
        let mut extractor = Self::new();
        extractor.fallback_base_url = config.fallback_base_url.clone();
        extractor.temp_dir = config.temp_dir.clone();
        extractor
    }

    /// Base URL used to recover missing local documents
    pub fn with_fallback_base_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(url.into());
        self
    }

    /// Directory for downloaded documents
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Replace the parser registry
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Resolve and parse a document reference
    pub async fn extract(&self, reference: &str) -> Result<ParsedDocument> {
        match DocumentSource::parse(reference) {
            DocumentSource::Remote(url) => self.extract_remote(&url).await,
            DocumentSource::Local(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Reading local document");
                self.parse_file(path).await
            }
            DocumentSource::Local(path) => {
                let url = self.recovery_url(&path)?;
                tracing::warn!(
                    path = %path.display(),
                    url = %url,
                    "Local document not found, trying storage URL"
                );
                self.extract_remote(&url).await
            }
        }
    }

    fn recovery_url(&self, path: &Path) -> Result<String> {
        let not_found = || ParserError::IoError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "document not found"),
        };

        let base = self.fallback_base_url.as_deref().ok_or_else(not_found)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(not_found)?;

        Ok(format!("{}/{}", base.trim_end_matches('/'), file_name))
    }

    async fn extract_remote(&self, url: &str) -> Result<ParsedDocument> {
        let download = self.download(url).await?;
        let result = self.parse_file(download.path().to_path_buf()).await;

        let temp_path = download.path().display().to_string();
        if let Err(e) = download.close() {
            tracing::warn!(path = %temp_path, error = %e, "Failed to remove downloaded document");
        } else {
            tracing::debug!(path = %temp_path, "Temporary document removed");
        }

        result
    }

    /// Download a remote document into a temporary file owned by the caller
    async fn download(&self, url: &str) -> Result<NamedTempFile> {
        tracing::info!(url = %url, "Downloading document");

        let to_download_error = |source| ParserError::Download {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(to_download_error)?;
        let bytes = response.bytes().await.map_err(to_download_error)?;

        let suffix = file_name_from_url(url)
            .map(|name| FileType::from_path(Path::new(name)))
            .filter(|file_type| *file_type != FileType::Unknown)
            .map(|file_type| format!(".{}", file_type.extension()))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("evalrag-").suffix(&suffix);
        let temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };

        let io_error = |source| ParserError::IoError {
            path: url.to_string(),
            source,
        };
        let mut file = temp.map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        tracing::debug!(url = %url, bytes = bytes.len(), path = %file.path().display(), "Document downloaded");
        Ok(file)
    }

    async fn parse_file(&self, path: PathBuf) -> Result<ParsedDocument> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || registry.parse(&path))
            .await
            .map_err(|e| ParserError::TaskFailed(e.to_string()))?
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtraction for TextExtractor {
    async fn extract_text(&self, reference: &str) -> evalrag_core::Result<String> {
        let doc = self.extract(reference).await?;
        tracing::info!(
            file_type = %doc.file_type,
            chars = doc.char_count(),
            "Text extracted"
        );
        Ok(doc.content)
    }
}
