//! Overlapping text chunker.
//!
//! Splits text into windows of at most `chunk_size` characters (Unicode
//! scalar values — all sizes and offsets in this module are character
//! counts, not bytes). Consecutive chunks share exactly `overlap` trailing/
//! leading characters so retrieval context survives a chunk boundary.
//!
//! When a window does not reach the end of the text, the cut prefers the
//! last paragraph boundary (`\n\n`) inside the window, then the last
//! sentence end, then the last whitespace, before falling back to the raw
//! window end. The cut always lands strictly after `start + overlap`, so
//! every step makes progress. Splitting is deterministic: identical input
//! and parameters produce identical chunks.

use sha2::{Digest, Sha256};

use crate::error::{Result, VellumError};
use crate::models::Segment;

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// A text of at most `chunk_size` characters yields exactly one chunk equal
/// to the whole text. Fails with a configuration error unless both
/// parameters are positive and `overlap < chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(VellumError::config("chunk_size must be > 0"));
    }
    if overlap == 0 {
        return Err(VellumError::config("overlap must be > 0"));
    }
    if overlap >= chunk_size {
        return Err(VellumError::config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    // Byte offset of every char, plus an end sentinel, so slicing never
    // lands inside a multi-byte sequence.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = offsets.len() - 1;

    if n <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let window_end = (start + chunk_size).min(n);
        let cut = if window_end == n {
            n
        } else {
            find_cut(&chars, start + overlap + 1, window_end)
        };

        chunks.push(text[offsets[start]..offsets[cut]].to_string());

        if cut == n {
            break;
        }
        start = cut - overlap;
    }

    Ok(chunks)
}

/// Pick the best cut position in `[lo, hi]` (both char indices).
///
/// A cut at position `p` means the chunk ends just before `chars[p]`.
fn find_cut(chars: &[char], lo: usize, hi: usize) -> usize {
    // Paragraph boundary: cut right after "\n\n".
    for p in (lo..=hi).rev() {
        if p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n' {
            return p;
        }
    }

    // Sentence end: a newline, or ". ", "! ", "? " (cut after the space).
    for p in (lo..=hi).rev() {
        if chars[p - 1] == '\n' {
            return p;
        }
        if p >= 2
            && chars[p - 1].is_whitespace()
            && matches!(chars[p - 2], '.' | '!' | '?')
        {
            return p;
        }
    }

    // Any whitespace.
    for p in (lo..=hi).rev() {
        if chars[p - 1].is_whitespace() {
            return p;
        }
    }

    hi
}

/// Flatten one or more text units of a single item into [`Segment`]s with a
/// contiguous `chunk_index` sequence.
pub fn segment(
    source_id: &str,
    texts: &[&str],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut index: i64 = 0;

    for text in texts {
        for chunk in split(text, chunk_size, overlap)? {
            segments.push(make_segment(source_id, index, chunk));
            index += 1;
        }
    }

    Ok(segments)
}

fn make_segment(source_id: &str, index: i64, text: String) -> Segment {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Segment {
        text,
        source_id: source_id.to_string(),
        chunk_index: index,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undo the documented overlap: chunk 0 whole, then each subsequent
    /// chunk minus its first `overlap` chars.
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split("Hello, world!", 100, 20).unwrap();
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);

        // Exactly chunk_size chars is still a single chunk.
        let text = "a".repeat(100);
        let chunks = split(&text, 100, 20).unwrap();
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_empty_text_single_empty_chunk() {
        let chunks = split("", 100, 20).unwrap();
        assert_eq!(chunks, vec![String::new()]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            split("abc", 0, 1).unwrap_err(),
            VellumError::Configuration { .. }
        ));
        assert!(matches!(
            split("abc", 10, 0).unwrap_err(),
            VellumError::Configuration { .. }
        ));
        assert!(matches!(
            split("abc", 10, 10).unwrap_err(),
            VellumError::Configuration { .. }
        ));
        assert!(matches!(
            split("abc", 10, 11).unwrap_err(),
            VellumError::Configuration { .. }
        ));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma. ".repeat(200);
        let a = split(&text, 300, 60).unwrap();
        let b = split(&text, 300, 60).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlap_shared_between_adjacent_chunks() {
        // No break opportunities, so every cut is a raw window end.
        let text = "a".repeat(2500);
        let chunks = split(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 1000);
        assert_eq!(chunks[2].chars().count(), 900);

        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - 200)
                .collect();
            let head: String = pair[1].chars().take(200).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_coverage_reconstructs_original() {
        let plain = "a".repeat(2500);
        let prose = "The quick brown fox jumps over the lazy dog. ".repeat(80);
        let multiline = "First paragraph about storage.\n\nSecond paragraph about indexes.\n\n"
            .repeat(40);

        for text in [plain.as_str(), prose.as_str(), multiline.as_str()] {
            let chunks = split(text, 1000, 200).unwrap();
            assert_eq!(reconstruct(&chunks, 200), text);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "A".repeat(30), "B".repeat(40));
        let chunks = split(&text, 50, 10).unwrap();
        assert!(chunks[0].ends_with("\n\n"), "chunk: {:?}", chunks[0]);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_prefers_sentence_boundary_over_raw_cut() {
        let text = format!("{}. {}", "A".repeat(30), "B".repeat(40));
        let chunks = split(&text, 50, 10).unwrap();
        assert!(chunks[0].ends_with(". "), "chunk: {:?}", chunks[0]);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn test_multibyte_text_is_not_split_mid_char() {
        let text = "é".repeat(1200);
        let chunks = split(&text, 500, 100).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 100), text);
    }

    #[test]
    fn test_segment_indices_contiguous_across_units() {
        let pages = ["First page. ".repeat(100), "Second page. ".repeat(100)];
        let units: Vec<&str> = pages.iter().map(String::as_str).collect();
        let segments = segment("item-1", &units, 300, 60).unwrap();

        assert!(segments.len() > 2);
        for (i, seg) in segments.iter().enumerate() {
            assert_eq!(seg.chunk_index, i as i64);
            assert_eq!(seg.source_id, "item-1");
            assert_eq!(seg.hash.len(), 64);
        }
    }

    #[test]
    fn test_segment_hashes_match_text() {
        let segments = segment("item-1", &["hello world"], 100, 10).unwrap();
        assert_eq!(segments.len(), 1);
        let mut hasher = Sha256::new();
        hasher.update(b"hello world");
        assert_eq!(segments[0].hash, format!("{:x}", hasher.finalize()));
    }
}
