//! Boundary-aware text splitting over `text_splitter`.
//!
//! Chunks are measured in characters and cut at the coarsest semantic
//! boundary that fits (paragraphs, then lines, sentences, words, graphemes).
//! Consecutive chunks share up to `chunk_overlap` characters.

use eventintel_shared::{EventIntelError, Result};
use text_splitter::ChunkConfig;

/// Splits documents into overlapping chunks measured in characters.
#[derive(Debug)]
pub struct TextSplitter {
    inner: text_splitter::TextSplitter<text_splitter::Characters>,
}

impl TextSplitter {
    /// Fails when `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(chunk_size.max(1))
            .with_overlap(chunk_overlap)
            .map_err(|e| EventIntelError::config(format!("invalid chunking settings: {e}")))?;
        Ok(Self {
            inner: text_splitter::TextSplitter::new(config),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.inner
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}
