//! Fixed-window text chunker with overlap.
//!
//! Splits chapter text into consecutive windows of `chunk_size` characters,
//! each sharing `overlap` characters with the window before it. Windows are
//! measured in Unicode scalar values, so CJK text is never split inside a
//! character.
//!
//! # Algorithm
//!
//! 1. Compute the advance step `chunk_size - overlap`, clamped to at least 1.
//! 2. Emit the window `[start, start + chunk_size)` (shorter at the end).
//! 3. Stop once a window reaches the end of the text; otherwise advance
//!    `start` by the step and repeat.
//!
//! Text is never trimmed or normalized. Dropping the first `overlap`
//! characters of every chunk after the first and concatenating reproduces
//! the input exactly.
//!
//! # Example
//!
//! ```rust
//! use novel_muse_core::chunk::split_text;
//!
//! let chunks = split_text("abcdefghij", 4, 1);
//! assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
//! ```

use serde::Deserialize;

/// Default window length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default number of characters shared by neighbouring windows.
pub const DEFAULT_OVERLAP: usize = 100;

/// Window parameters for [`split_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChunkParams {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkParams {
    /// Window length actually used; a zero size is treated as 1.
    pub fn window(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Distance between consecutive window starts, never below 1.
    ///
    /// When `overlap >= chunk_size` the step is clamped to 1 so that
    /// chunking always terminates.
    pub fn step(&self) -> usize {
        self.window().saturating_sub(self.overlap).max(1)
    }

    /// Characters actually shared by neighbouring windows after clamping.
    pub fn effective_overlap(&self) -> usize {
        self.window() - self.step()
    }

    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        split_windows(text, self.window(), self.step())
    }
}

/// Split `text` into overlapping windows and return them as owned strings.
///
/// Returns an empty vector for empty text. For non-empty text the number
/// of chunks is `1` when the text fits in one window, otherwise
/// `ceil((len - overlap) / (chunk_size - overlap))`. Every chunk except
/// the last is exactly `chunk_size` characters long.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    ChunkParams {
        chunk_size,
        overlap,
    }
    .split(text)
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn split_windows(text: &str, window: usize, step: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::with_capacity(len / step + 1);
    let mut start = 0;
    loop {
        let end = (start + window).min(len);
        chunks.push(&text[bounds[start]..bounds[end]]);
        if end == len {
            break;
        }
        start += step;
    }
    chunks
}
