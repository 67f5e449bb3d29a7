//! Recursive character text splitting with overlap

use std::collections::VecDeque;

/// Separators tried from coarsest to finest; "" splits into characters
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Text chunker with configurable size and overlap
///
/// Text is split on the coarsest separator it contains; pieces shorter than
/// `chunk_size` are merged back into chunks, and longer pieces are split again
/// with the next separator. Sizes are measured in characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks in characters
    overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Target chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// Greedily merge small pieces into chunks, carrying overlap forward
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = join_trimmed(&current) {
                    chunks.push(chunk);
                }

                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            current.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join_trimmed(&current) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

/// Split so that each separator occurrence starts a new piece
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.split_text("This is a test document about AI.");
        assert_eq!(chunks, vec!["This is a test document about AI.".to_string()]);
    }

    #[test]
    fn test_empty_and_blank_text() {
        let chunker = TextChunker::default();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\n  \n ").is_empty());
    }

    #[test]
    fn test_character_split_with_overlap() {
        let chunker = TextChunker::new(500, 50);
        let text = "a".repeat(1200);
        let chunks = chunker.split_text(&text);

        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, vec![500, 500, 300]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = TextChunker::new(100, 20);
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "no overlap between chunks");
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let chunker = TextChunker::new(60, 10);
        let text = "First paragraph is here.\n\nSecond paragraph is here.\n\nThird paragraph is here.";
        let chunks = chunker.split_text(text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph is here.\n\nSecond paragraph is here.");
        assert_eq!(chunks[1], "Third paragraph is here.");
    }

    #[test]
    fn test_multibyte_text_is_counted_in_characters() {
        let chunker = TextChunker::new(10, 0);
        let chunks = chunker.split_text(&"ü".repeat(25));
        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn test_overlap_is_clamped_below_chunk_size() {
        let chunker = TextChunker::new(10, 50);
        assert_eq!(chunker.overlap(), 9);
        assert!(!chunker.split_text(&"x".repeat(40)).is_empty());
    }
}
