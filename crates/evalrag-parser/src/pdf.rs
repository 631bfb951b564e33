//! PDF document parser using pdf-extract
//!
//! Extracts text page by page. Pages are joined with a newline; page text
//! is kept exactly as pdf-extract returns it.

use std::path::Path;

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
#[derive(Debug, Default)]
pub struct PdfParser;

impl PdfParser {
    /// Create a new PDF parser
    pub fn new() -> Self {
        Self
    }

    /// Extract the text of every page from a PDF file
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))
    }
}

/// Join per-page text into one document, one newline per page break
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|page| page.as_ref().trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let pages = self.extract_pages(path)?;
        tracing::debug!(path = %path.display(), pages = pages.len(), "PDF pages extracted");

        let mut doc = ParsedDocument::new(path.display().to_string(), FileType::Pdf)
            .with_content(join_pages(&pages));
        doc.page_count = Some(pages.len() as u32);

        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}
