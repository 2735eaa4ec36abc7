//! Fixed-size sliding-window chunking.
//!
//! Windows are measured in characters (Unicode scalar values). Chunk `k`
//! covers `[k * stride, k * stride + chunk_size)` clipped at the end of the
//! text, where `stride = chunk_size - overlap`. A window is produced for every
//! `k` whose start lies inside the text, so the final windows may be shorter
//! than `chunk_size`.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Fraction of the chunk size that consecutive windows share.
pub const OVERLAP_RATIO: f64 = 0.2;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl ChunkConfig {
    /// Build a config, rejecting parameters whose stride would not advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Derive the overlap from [`OVERLAP_RATIO`].
    pub fn for_chunk_size(chunk_size: usize) -> Result<Self> {
        let overlap = (chunk_size as f64 * OVERLAP_RATIO).round() as usize;
        Self::new(chunk_size, overlap)
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// A window of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text content.
    pub text: String,
    /// Position of the source document in the submitted batch.
    pub source_doc_index: usize,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// Start character offset (inclusive).
    pub start: usize,
    /// End character offset (exclusive).
    pub end: usize,
}

/// Split `text` into overlapping windows.
///
/// Whitespace-only input yields no chunks. Fails with
/// [`RagError::InvalidConfig`] when `overlap >= chunk_size`.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_size, overlap)?;
    Ok(chunk_document(text, 0, &config))
}

/// Split one document of a batch, tagging chunks with `source_doc_index`.
pub fn chunk_document(text: &str, source_doc_index: usize, config: &ChunkConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let stride = config.stride();

    (0..)
        .map(|k| k * stride)
        .take_while(|&start| start < char_len)
        .enumerate()
        .map(|(chunk_index, start)| {
            let end = (start + config.chunk_size).min(char_len);
            Chunk {
                text: text[boundaries[start]..boundaries[end]].to_string(),
                source_doc_index,
                chunk_index,
                start,
                end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.";

    /// Rebuild the source by dropping the overlapping prefix of every window after the first.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_known_windows() {
        let chunks = chunk("abcdefghij", 4, 1).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij", "j"]);
        assert_eq!(chunks[2].start, 6);
        assert_eq!(chunks[3].end, 10);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i));
    }

    #[test]
    fn test_deterministic() {
        for (size, overlap) in [(10, 2), (7, 0), (30, 29), (200, 40)] {
            let first = chunk(SAMPLE, size, overlap).unwrap();
            let second = chunk(SAMPLE, size, overlap).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_reconstructs_source() {
        for (size, overlap) in [(10, 2), (7, 0), (30, 29), (200, 40), (5, 4)] {
            let chunks = chunk(SAMPLE, size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), SAMPLE);
        }
    }

    #[test]
    fn test_covers_every_offset() {
        let len = SAMPLE.chars().count();
        for (size, overlap) in [(10, 2), (3, 0), (13, 6)] {
            let chunks = chunk(SAMPLE, size, overlap).unwrap();
            let mut covered = vec![false; len];
            for c in &chunks {
                assert!(c.end <= len);
                assert!(c.end - c.start <= size);
                covered[c.start..c.end].iter_mut().for_each(|x| *x = true);
            }
            assert!(covered.iter().all(|&x| x));
        }
    }

    #[test]
    fn test_invalid_stride_rejected() {
        assert!(matches!(chunk(SAMPLE, 5, 5), Err(RagError::InvalidConfig(_))));
        assert!(matches!(chunk(SAMPLE, 5, 9), Err(RagError::InvalidConfig(_))));
        assert!(matches!(chunk(SAMPLE, 0, 0), Err(RagError::InvalidConfig(_))));
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(chunk("", 10, 2).unwrap().is_empty());
        assert!(chunk("   \n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo wörld ✓ ok";
        let chunks = chunk(text, 5, 1).unwrap();
        assert_eq!(chunks[0].text, "héllo");
        assert_eq!(reconstruct(&chunks, 1), text);
    }

    #[test]
    fn test_derived_overlap() {
        let config = ChunkConfig::for_chunk_size(256).unwrap();
        assert_eq!(config.chunk_overlap, 51);
        assert_eq!(ChunkConfig::for_chunk_size(3).unwrap().chunk_overlap, 1);
        assert_eq!(ChunkConfig::for_chunk_size(1).unwrap().chunk_overlap, 0);
        assert!(ChunkConfig::for_chunk_size(0).is_err());
    }
}
