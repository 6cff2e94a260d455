//! Sliding-window text chunker.
//!
//! Splits extracted document text into windows of at most `size`
//! characters. Consecutive windows start `size - overlap` characters apart,
//! so each window repeats the last `overlap` characters of the previous
//! one. Windows are trimmed and dropped when blank.
//!
//! Offsets are counted in `char`s, never bytes, so multi-byte text is never
//! split inside a code point.

use crate::config::ChunkingConfig;

/// Split `text` into overlapping windows.
///
/// Returns windows in document order. A text no longer than `size` yields
/// exactly one chunk (its trimmed form), or none if it is blank.
///
/// `overlap` must be smaller than `size`; config validation enforces this.
/// If it is not, the stride is clamped to one character so the loop still
/// advances.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }
    debug_assert!(overlap < size, "overlap must be smaller than size");
    let stride = size.saturating_sub(overlap).max(1);

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n_chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < n_chars {
        let end = (start + size).min(n_chars);
        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end == n_chars {
            break;
        }
        start += stride;
    }

    chunks
}

/// [`chunk_text`] with sizes taken from config.
pub fn chunk_with(text: &str, config: &ChunkingConfig) -> Vec<String> {
    chunk_text(text, config.size, config.overlap)
}
