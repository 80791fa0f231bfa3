use anyhow::{ensure, Result};

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Position of this chunk in the chunk sequence
    pub chunk_index: usize,
    /// Starting character offset of this chunk in the source text
    pub start_position: usize,
}

/// Splits text into bounded, overlapping chunks.
///
/// Lengths are counted in characters. A chunk prefers to end right after
/// the last `separator` inside its window and is cut hard at `chunk_size`
/// when no usable separator exists. Every chunk after the first starts
/// `chunk_overlap` characters before the end of its predecessor.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a new splitter, rejecting an overlap that would stall progress
    pub fn new(separator: impl Into<String>, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        ensure!(chunk_size > 0, "chunk size must be positive");
        ensure!(
            chunk_overlap < chunk_size,
            "chunk overlap ({}) must be smaller than chunk size ({})",
            chunk_overlap,
            chunk_size
        );

        Ok(TextSplitter {
            separator: separator.into(),
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split text into chunks
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every char boundary, including the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_len {
            let window_end = (start + self.chunk_size).min(char_len);
            let end = if window_end == char_len {
                char_len
            } else {
                self.separator_boundary(text, &boundaries, start, window_end)
                    .unwrap_or(window_end)
            };

            chunks.push(TextChunk {
                text: text[boundaries[start]..boundaries[end]].to_string(),
                chunk_index: chunks.len(),
                start_position: start,
            });

            if end == char_len {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Char position just after the last separator in `[start, window_end)`
    /// that still leaves room for the overlap
    fn separator_boundary(
        &self,
        text: &str,
        boundaries: &[usize],
        start: usize,
        window_end: usize,
    ) -> Option<usize> {
        if self.separator.is_empty() {
            return None;
        }

        let window = &text[boundaries[start]..boundaries[window_end]];
        let found = window.rfind(&self.separator)?;
        let split_byte = found + self.separator.len();
        let end = start + window[..split_byte].chars().count();

        (end > start + self.chunk_overlap).then_some(end)
    }
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}
