//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`CharacterChunker`], a
//! sliding character window with overlap.

use crate::document::Chunk;

/// Metadata key holding a chunk's position within its source document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A strategy for splitting a source document into chunks.
///
/// The document is itself a [`Chunk`] whose content is the full text; the
/// produced chunks inherit its metadata.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Chunk) -> Vec<Chunk>;
}

/// Splits text into fixed-size windows by character count with overlap.
///
/// Windows never split a code point. A document that already fits is
/// returned as a single chunk. Every chunk carries the parent metadata plus
/// a `chunk_index` entry.
///
/// # Example
///
/// ```rust,ignore
/// use fleet_rag::CharacterChunker;
///
/// let chunker = CharacterChunker::new(1000, 200);
/// let chunks = chunker.chunk(&manual);
/// ```
#[derive(Debug, Clone)]
pub struct CharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for CharacterChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl CharacterChunker {
    /// Create a new `CharacterChunker`.
    ///
    /// `chunk_size` is clamped to at least 1 and `chunk_overlap` to below
    /// `chunk_size`, so the window always advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for CharacterChunker {
    fn chunk(&self, document: &Chunk) -> Vec<Chunk> {
        if document.content.trim().is_empty() {
            return Vec::new();
        }

        let boundaries: Vec<usize> = document
            .content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(document.content.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total_chars);
            let text = &document.content[boundaries[start]..boundaries[end]];

            let mut chunk = Chunk::new(text);
            chunk.metadata = document.metadata.clone();
            chunk.metadata.insert(CHUNK_INDEX_KEY.to_string(), chunks.len().to_string());
            chunks.push(chunk);

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Chunk {
        Chunk::new(text).with_source("manual.txt")
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = CharacterChunker::new(1000, 200).chunk(&doc("Check tire pressure weekly."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Check tire pressure weekly.");
        assert_eq!(chunks[0].source(), "manual.txt");
        assert_eq!(chunks[0].metadata[CHUNK_INDEX_KEY], "0");
    }

    #[test]
    fn windows_overlap() {
        let chunks = CharacterChunker::new(4, 2).chunk(&doc("abcdefgh"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "cdef", "efgh"]);
        assert_eq!(chunks[2].metadata[CHUNK_INDEX_KEY], "2");
    }

    #[test]
    fn respects_char_boundaries() {
        let chunks = CharacterChunker::new(2, 0).chunk(&doc("ééé"));
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, vec!["éé", "é"]);
    }

    #[test]
    fn empty_document_gives_no_chunks() {
        assert!(CharacterChunker::default().chunk(&doc("  \n")).is_empty());
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let chunker = CharacterChunker::new(3, 10);
        assert_eq!(chunker.chunk_overlap(), 2);
        assert_eq!(chunker.chunk(&doc("abcde")).len(), 3);
    }
}
