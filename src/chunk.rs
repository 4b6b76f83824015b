//! Sentence-boundary text chunker.
//!
//! Splits extracted document text into bounded-size segments for use as chat
//! context. Splitting prefers sentence boundaries (`.`, `!`, `?`); sentences
//! are greedily accumulated up to `max_chunk_size` and flushed with a
//! trailing period. A single sentence longer than the limit falls back to
//! greedy word accumulation, and a single word longer than the limit is
//! passed through whole.
//!
//! The algorithm is deterministic and order-preserving: concatenating the
//! output chunks reproduces the input's content modulo collapsed separators
//! and inserted `". "` joiners.

/// Default maximum chunk size in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2000;

/// Split text into ordered chunks of at most `max_chunk_size` bytes.
///
/// Text that already fits the limit is returned as a single chunk, verbatim.
/// No chunk exceeds the limit except when it consists of a single word that
/// is itself longer than the limit.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    if text.len() <= max_chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in text.split(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        // Length if this sentence were appended with a ". " joiner.
        let joined_len = if current.is_empty() {
            sentence.len()
        } else {
            current.len() + 2 + sentence.len()
        };

        if joined_len <= max_chunk_size {
            if !current.is_empty() {
                current.push_str(". ");
            }
            current.push_str(sentence);
            continue;
        }

        if !current.is_empty() {
            chunks.push(format!("{current}."));
            current.clear();
        }

        if sentence.len() > max_chunk_size {
            // Sentence alone exceeds the limit; fall back to word
            // accumulation. The remainder seeds the next chunk.
            let mut word_chunk = String::new();
            for word in sentence.split(' ') {
                let candidate_len = if word_chunk.is_empty() {
                    word.len()
                } else {
                    word_chunk.len() + 1 + word.len()
                };
                if candidate_len <= max_chunk_size {
                    if !word_chunk.is_empty() {
                        word_chunk.push(' ');
                    }
                    word_chunk.push_str(word);
                } else {
                    if !word_chunk.is_empty() {
                        chunks.push(std::mem::take(&mut word_chunk));
                    }
                    word_chunk = word.to_string();
                }
            }
            if !word_chunk.is_empty() {
                current = word_chunk;
            }
        } else {
            current = sentence.to_string();
        }
    }

    if !current.is_empty() {
        if !current.ends_with('.') {
            current.push('.');
        }
        chunks.push(current);
    }

    chunks
}

/// Whitespace-delimited token count. At least 1 for non-empty trimmed text.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk_verbatim() {
        let text = "The quick brown fox jumps over the lazy dog near here";
        let chunks = chunk_text(text, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(chunks, vec![text.to_string()]);
        assert_eq!(count_words(&chunks[0]), 11);
    }

    #[test]
    fn exactly_at_limit_is_single_chunk() {
        let text = "a".repeat(40);
        let chunks = chunk_text(&text, 40);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn sentences_accumulate_until_limit() {
        let text = "Alpha one two. Beta three four. Gamma five six. Delta seven eight.";
        let chunks = chunk_text(text, 35);
        assert!(chunks.len() > 1, "expected multiple chunks: {chunks:?}");
        for c in &chunks {
            assert!(c.len() <= 35, "chunk over limit: {c:?}");
            assert!(c.ends_with('.'), "chunk missing terminator: {c:?}");
            assert!(!c.trim().is_empty());
        }
    }

    #[test]
    fn every_word_survives_chunking() {
        let text = "One two three. Four five six! Seven eight nine? Ten eleven twelve.";
        let chunks = chunk_text(text, 20);
        let joined = chunks.join(" ");
        for word in [
            "One", "two", "three", "Four", "five", "six", "Seven", "eight", "nine", "Ten",
            "eleven", "twelve",
        ] {
            assert!(joined.contains(word), "lost {word:?} in {chunks:?}");
        }
    }

    #[test]
    fn consecutive_separators_collapse() {
        let text = format!("Really?! Are you sure... {}", "x".repeat(30));
        let chunks = chunk_text(&text, 30);
        for c in &chunks {
            assert!(!c.trim().is_empty());
        }
        let joined = chunks.join(" ");
        assert!(joined.contains("Really"));
        assert!(joined.contains("Are you sure"));
    }

    #[test]
    fn oversized_sentence_splits_on_words() {
        // One long sentence, no internal punctuation.
        let words: Vec<String> = (0..40).map(|i| format!("word{i}")).collect();
        let text = format!("{}.{}", words.join(" "), "tail sentence padding here");
        let chunks = chunk_text(&text, 50);
        for c in &chunks {
            assert!(c.len() <= 50, "chunk over limit: {c:?}");
        }
        let joined = chunks.join(" ");
        for w in &words {
            assert!(joined.contains(w.as_str()));
        }
    }

    #[test]
    fn oversized_single_word_passes_through_whole() {
        let long_word = "x".repeat(100);
        let text = format!("{long_word} trailing words go here. Another sentence follows now.");
        let chunks = chunk_text(&text, 40);
        assert!(
            chunks.iter().any(|c| c.contains(&long_word)),
            "oversized word dropped: {chunks:?}"
        );
    }

    #[test]
    fn last_chunk_gets_terminator() {
        let text = "First sentence here. Second sentence there. Third one trails";
        let chunks = chunk_text(text, 30);
        assert!(chunks.last().unwrap().ends_with('.'));
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        assert_eq!(chunk_text(text, 25), chunk_text(text, 25));
    }

    #[test]
    fn count_words_basic() {
        assert_eq!(count_words("one two three"), 3);
        assert_eq!(count_words("  spaced   out  "), 2);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("single"), 1);
    }
}
