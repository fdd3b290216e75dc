//! Paragraph chunking for embedding generation.
//!
//! Artifact text is split at paragraph boundaries (runs of blank lines) and
//! greedily packed into chunks bounded by a soft character limit. A single
//! paragraph longer than the limit is emitted whole; the bound is a target,
//! not a guarantee.

use regex::Regex;

use vestige_core::defaults;

/// Configuration for the paragraph chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Soft maximum chunk size in characters.
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::CHUNK_MAX_CHARS,
        }
    }
}

/// Splits text at paragraph boundaries and packs paragraphs greedily.
///
/// Deterministic: the same text and configuration always produce the same
/// chunk sequence, so reindexing an unchanged artifact is idempotent.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    config: ChunkerConfig,
    boundary: Regex,
}

impl ParagraphChunker {
    /// Create a chunker with the given configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            boundary: Regex::new(r"\n{2,}").unwrap(),
        }
    }

    /// Get the configuration used by this chunker.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk the given text into an ordered sequence of bounded chunks.
    ///
    /// Empty or whitespace-only input yields an empty sequence.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<&str> = self
            .boundary
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for paragraph in paragraphs {
            let para_chars = paragraph.chars().count();

            if buffer.is_empty() {
                buffer.push_str(paragraph);
                buffer_chars = para_chars;
                continue;
            }

            // Joining adds a blank line (two chars) between paragraphs.
            if buffer_chars + 2 + para_chars > self.config.max_chars {
                chunks.push(std::mem::take(&mut buffer));
                buffer.push_str(paragraph);
                buffer_chars = para_chars;
            } else {
                buffer.push_str("\n\n");
                buffer.push_str(paragraph);
                buffer_chars += 2 + para_chars;
            }
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        chunks
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker_with_max(max_chars: usize) -> ParagraphChunker {
        ParagraphChunker::new(ChunkerConfig { max_chars })
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = ParagraphChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  \n\n ").is_empty());
    }

    #[test]
    fn test_single_paragraph_single_chunk() {
        let chunker = ParagraphChunker::default();
        let chunks = chunker.chunk("Just one paragraph here.");
        assert_eq!(chunks, vec!["Just one paragraph here."]);
    }

    #[test]
    fn test_each_paragraph_flushed_when_tiny_limit() {
        let chunker = chunker_with_max(3);
        let chunks = chunker.chunk("A\n\nB\n\nC");
        assert_eq!(chunks, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_paragraphs_packed_when_they_fit() {
        let chunker = chunker_with_max(20);
        let chunks = chunker.chunk("one\n\ntwo\n\nthree");
        assert_eq!(chunks, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn test_flush_starts_new_buffer_with_overflowing_paragraph() {
        let chunker = chunker_with_max(10);
        // "alpha" (5) + 2 + "beta" (4) = 11 > 10, so beta starts a new chunk.
        let chunks = chunker.chunk("alpha\n\nbeta");
        assert_eq!(chunks, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_oversized_paragraph_emitted_whole() {
        let chunker = chunker_with_max(5);
        let long = "a".repeat(50);
        let chunks = chunker.chunk(&format!("{}\n\nshort", long));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], long);
        assert_eq!(chunks[1], "short");
    }

    #[test]
    fn test_runs_of_blank_lines_collapse() {
        let chunker = chunker_with_max(3);
        let chunks = chunker.chunk("A\n\n\n\nB\n\n\nC");
        assert_eq!(chunks, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_whitespace_paragraphs_dropped() {
        let chunker = chunker_with_max(3);
        let chunks = chunker.chunk("A\n\n   \n\nB");
        assert_eq!(chunks, vec!["A", "B"]);
    }

    #[test]
    fn test_chunking_is_idempotent() {
        let chunker = chunker_with_max(40);
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird one is a bit longer than the others.";
        let first = chunker.chunk(text);
        let second = chunker.chunk(text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_multibyte_counts_chars_not_bytes() {
        let chunker = chunker_with_max(10);
        // Ten two-byte chars fit exactly under a ten-char limit.
        let para = "é".repeat(10);
        let chunks = chunker.chunk(&para);
        assert_eq!(chunks, vec![para]);
    }

    #[test]
    fn test_chunk_bound_respected_for_packed_chunks() {
        let chunker = chunker_with_max(30);
        let text = "aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc\n\ndddddddddd";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "chunk too long: {:?}", chunk);
        }
        // Order preserved across flushes.
        assert_eq!(chunks.join("\n\n"), text);
    }
}
