//! Fixed-size overlapping chunking of normalized text
//!
//! Chunk `i` starts at character `i * (chunk_size - overlap)`. Chunking stops
//! at the first window that reaches the end of the text, so no trailing chunk
//! is ever fully contained in its predecessor.

use std::sync::OnceLock;

use regex::Regex;

use crate::{ParserError, Result};

/// Configuration for document chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// Create a validated configuration
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// `overlap < chunk_size` guarantees every step makes progress
    pub fn validate(&self) -> Result<()> {
        if self.overlap >= self.chunk_size {
            return Err(ParserError::InvalidChunkConfig {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between the starts of consecutive chunks
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A chunk of normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk content
    pub content: String,

    /// Chunk index within the document
    pub index: u32,

    /// Starting character offset in the normalized text
    pub start_offset: usize,

    /// Ending character offset (exclusive)
    pub end_offset: usize,
}

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").trim().to_string()
}

/// Split text into overlapping windows of at most `chunk_size` characters
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<TextChunk>> {
    config.validate()?;

    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    // Byte position of every character boundary, so windows never split a char.
    let boundaries: Vec<usize> = normalized
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(normalized.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(char_len / config.step() + 1);
    let mut start = 0;

    loop {
        let end = (start + config.chunk_size).min(char_len);
        chunks.push(TextChunk {
            content: normalized[boundaries[start]..boundaries[end]].to_string(),
            index: chunks.len() as u32,
            start_offset: start,
            end_offset: end,
        });

        if end == char_len {
            break;
        }
        start += config.step();
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expected_count(len: usize, config: &ChunkConfig) -> usize {
        if len == 0 {
            0
        } else if len <= config.overlap {
            1
        } else {
            (len - config.overlap).div_ceil(config.step())
        }
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  Cell \n\n membrane\t\tfunction  "),
            "Cell membrane function"
        );
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_empty_input() {
        let chunks = chunk_text("", &ChunkConfig::default()).unwrap();
        assert!(chunks.is_empty());

        let chunks = chunk_text("   \n  ", &ChunkConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_reference_document_offsets() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, &ChunkConfig::default()).unwrap();

        assert_eq!(chunks.len(), 3);
        let starts: Vec<_> = chunks.iter().map(|c| c.start_offset).collect();
        assert_eq!(starts, vec![0, 1000, 2000]);
        assert_eq!(chunks[0].content.len(), 1200);
        assert_eq!(chunks[2].content.len(), 500);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Mitochondria are organelles.", &ChunkConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Mitochondria are organelles.");
    }

    #[test]
    fn test_invalid_overlap_is_rejected() {
        let config = ChunkConfig {
            chunk_size: 100,
            overlap: 100,
        };
        assert!(matches!(
            chunk_text("some text", &config),
            Err(ParserError::InvalidChunkConfig { .. })
        ));
        assert!(ChunkConfig::new(0, 0).is_err());
        assert!(ChunkConfig::new(50, 10).is_ok());
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let text = "é".repeat(25);
        let config = ChunkConfig::new(10, 3).unwrap();
        let chunks = chunk_text(&text, &config).unwrap();

        assert!(chunks.iter().all(|c| c.content.chars().count() <= 10));
        assert_eq!(chunks.len(), expected_count(25, &config));
    }

    proptest! {
        #[test]
        fn chunks_cover_text_without_gaps(
            text in "[a-z ]{0,600}",
            chunk_size in 1usize..120,
            overlap_seed in 0usize..120,
        ) {
            let config = ChunkConfig { chunk_size, overlap: overlap_seed % chunk_size };
            let normalized = normalize_whitespace(&text);
            let len = normalized.chars().count();
            let chunks = chunk_text(&text, &config).unwrap();

            prop_assert_eq!(chunks.len(), expected_count(len, &config));

            let mut covered = 0;
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.start_offset, i * config.step());
                prop_assert!(chunk.start_offset <= covered);
                prop_assert!(chunk.end_offset - chunk.start_offset <= config.chunk_size);
                let expected: String = normalized
                    .chars()
                    .skip(chunk.start_offset)
                    .take(chunk.end_offset - chunk.start_offset)
                    .collect();
                prop_assert_eq!(&chunk.content, &expected);
                covered = chunk.end_offset;
            }
            prop_assert_eq!(covered, len);
        }
    }
}
