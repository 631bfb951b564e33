//! EvalRAG Parser - Document text extraction and chunking
//!
//! Supports parsing of:
//! - PDF documents (page by page)
//! - Plain text and Markdown files
//!
//! Documents are resolved from URLs or local paths by the [`TextExtractor`],
//! parsed by a `DocumentParser`, and the resulting text is split into
//! overlapping windows by [`chunk_text`] for embedding.

use std::path::Path;
use thiserror::Error;

pub mod chunker;
pub mod extractor;
pub mod pdf;

pub use chunker::{chunk_text, normalize_whitespace, ChunkConfig, TextChunk};
pub use extractor::{DocumentSource, TextExtraction, TextExtractor};
pub use pdf::PdfParser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while resolving or parsing a document
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote document could not be fetched
    #[error("Failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// Chunk parameters that would never make progress
    #[error("Invalid chunk configuration: overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    /// Blocking parse task could not complete
    #[error("Parser task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for evalrag_core::EvalError {
    fn from(err: ParserError) -> Self {
        use evalrag_core::EvalError;

        match err {
            ParserError::Download { url, source } => EvalError::Download {
                url,
                source: Box::new(source),
            },
            invalid @ ParserError::InvalidChunkConfig { .. } => {
                EvalError::Configuration(invalid.to_string())
            }
            ParserError::IoError { path, source } => {
                EvalError::Extraction(format!("{path}: {source}"))
            }
            other => EvalError::Extraction(other.to_string()),
        }
    }
}

// ============================================================================
// Parsed Document Types
// ============================================================================

/// A parsed document with extracted content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Extracted text content, pages separated by a newline
    pub content: String,

    /// Number of pages (if the format has pages)
    pub page_count: Option<u32>,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            content: String::new(),
            page_count: None,
        }
    }

    /// Set content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Get total character count
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "md",
            Self::PlainText => "txt",
            Self::Unknown => "bin",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
    fallback_type: Option<FileType>,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            fallback_type: None,
        }
    }

    /// Registry with the PDF and plain text parsers; unknown extensions are read as PDF
    pub fn with_defaults() -> Self {
        let mut registry = Self::new().with_fallback(FileType::Pdf);
        registry.register(PdfParser::new());
        registry.register(PlainTextParser);
        registry
    }

    /// Treat files with unknown extensions as `file_type`
    pub fn with_fallback(mut self, file_type: FileType) -> Self {
        self.fallback_type = Some(file_type);
        self
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Resolve the type a path will be parsed as
    pub fn resolve_type(&self, path: &Path) -> FileType {
        match FileType::from_path(path) {
            FileType::Unknown => self.fallback_type.unwrap_or(FileType::Unknown),
            known => known,
        }
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let file_type = self.resolve_type(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let parser = self
            .find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        parser.parse(path)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain text parser
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(
            ParsedDocument::new(path.display().to_string(), FileType::PlainText)
                .with_content(content),
        )
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("pdf"), FileType::Pdf);
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("docx"), FileType::Unknown);
    }

    #[test]
    fn test_registry_fallback_type() {
        let registry = ParserRegistry::with_defaults();
        assert_eq!(registry.resolve_type(Path::new("essay")), FileType::Pdf);
        assert_eq!(
            registry.resolve_type(Path::new("notes.txt")),
            FileType::PlainText
        );

        let bare = ParserRegistry::new();
        assert_eq!(bare.resolve_type(Path::new("essay")), FileType::Unknown);
        assert!(matches!(
            bare.parse(Path::new("essay")),
            Err(ParserError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_plain_text_parsing() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "Photosynthesis converts light into chemical energy.").unwrap();

        let doc = ParserRegistry::with_defaults().parse(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::PlainText);
        assert_eq!(doc.char_count(), 51);
    }

    #[test]
    fn test_error_mapping() {
        use evalrag_core::EvalError;

        let err: EvalError = ParserError::PdfError("bad xref".to_string()).into();
        assert!(matches!(err, EvalError::Extraction(_)));

        let err: EvalError = ParserError::InvalidChunkConfig {
            chunk_size: 10,
            overlap: 10,
        }
        .into();
        assert!(matches!(err, EvalError::Configuration(_)));
    }
}
