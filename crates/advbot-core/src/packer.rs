//! Message packing
//!
//! Splits arbitrary text into chunks that fit a remote service's message
//! size limit without breaking words, except where a single word is itself
//! longer than the limit.

use crate::error::{AdvBotError, Result};

/// Message size used when nothing else is configured
pub const DEFAULT_MESSAGE_LIMIT: usize = 265;

/// A unit produced by splitting the joined text on single spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Non-empty run of non-space characters (or a fragment of one)
    Word(&'a str),
    /// An extra space from a run of two or more spaces
    Space,
}

impl Token<'_> {
    fn width(&self) -> usize {
        match self {
            Token::Word(word) => word.chars().count(),
            Token::Space => 1,
        }
    }
}

/// Pack `messages` into chunks shorter than `limit` characters.
///
/// The messages are joined with single spaces and re-split greedily. A token
/// is added to the current chunk while `current + token < limit`; the
/// accumulator carries one trailing separator, which is stripped when the
/// chunk is emitted. Tokens longer than `limit` are cut into `limit`-sized
/// fragments first. Chunks that are empty or all whitespace are dropped.
///
/// Lengths are measured in `char`s.
pub fn pack<S: AsRef<str>>(messages: &[S], limit: usize) -> Result<Vec<String>> {
    if limit == 0 {
        return Err(AdvBotError::InvalidArgument(
            "message limit must be positive".into(),
        ));
    }

    let text = messages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for token in tokenize(&text, limit) {
        let width = token.width();
        if current_len + width >= limit {
            chunks.push(emit(&mut current));
            current_len = 0;
        }
        match token {
            Token::Word(word) => {
                current.push_str(word);
                current.push(' ');
                current_len += width + 1;
            }
            Token::Space => {
                current.push(' ');
                current_len += 1;
            }
        }
    }
    chunks.push(emit(&mut current));

    chunks.retain(|chunk| !chunk.trim().is_empty());
    Ok(chunks)
}

/// Take the accumulated chunk, minus its trailing separator.
fn emit(current: &mut String) -> String {
    let mut chunk = std::mem::take(current);
    if chunk.ends_with(' ') {
        chunk.pop();
    }
    chunk
}

/// Split on single spaces, turning every empty piece (from a run of spaces)
/// into an explicit space token and fragmenting oversized words.
fn tokenize(text: &str, limit: usize) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for piece in text.split(' ') {
        if piece.is_empty() {
            tokens.push(Token::Space);
            continue;
        }
        if piece.chars().count() <= limit {
            tokens.push(Token::Word(piece));
            continue;
        }
        let mut rest = piece;
        while !rest.is_empty() {
            let cut = rest
                .char_indices()
                .nth(limit)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let (fragment, tail) = rest.split_at(cut);
            tokens.push(Token::Word(fragment));
            rest = tail;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(messages: &[&str], limit: usize) -> Vec<String> {
        pack(messages, limit).unwrap()
    }

    #[test]
    fn test_single_word_fits() {
        assert_eq!(packed(&["abc"], 45), vec!["abc"]);
    }

    #[test]
    fn test_messages_joined_with_space() {
        assert_eq!(packed(&["abc", "def"], 45), vec!["abc def"]);
    }

    #[test]
    fn test_strict_fit_reserves_one_character() {
        assert_eq!(packed(&["abc", "def"], 3), vec!["abc", "def"]);
    }

    #[test]
    fn test_oversized_words_are_fragmented() {
        assert_eq!(packed(&["abc", "def"], 2), vec!["ab", "c", "de", "f"]);
    }

    #[test]
    fn test_double_space_preserved() {
        assert_eq!(packed(&["abc.  def"], 15), vec!["abc.  def"]);
    }

    #[test]
    fn test_whitespace_only_chunk_dropped() {
        assert_eq!(packed(&["abc.  def"], 4), vec!["abc.", "def"]);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = pack(&["abc"], 0).unwrap_err();
        assert!(matches!(err, AdvBotError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_input() {
        assert!(packed(&[], 10).is_empty());
        assert!(packed(&[""], 10).is_empty());
        assert!(packed(&["   ", " "], 10).is_empty());
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        assert_eq!(packed(&["héllo"], 3), vec!["hél", "lo"]);
        assert_eq!(packed(&["ééé ééé"], 8), vec!["ééé ééé"]);
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_words() {
        let text = "West of House  You are standing in an open field west of a \
                    white house, with a boarded front door. There is a small \
                    mailbox here. Supercalifragilisticexpialidocious!";
        for limit in 1..60 {
            let chunks = packed(&[text], limit);

            let oversized: Vec<_> = chunks
                .iter()
                .filter(|c| c.chars().count() >= limit)
                .collect();
            for chunk in &oversized {
                // only a lone maximal fragment may reach the limit
                assert_eq!(chunk.chars().count(), limit, "limit {limit}: {chunk:?}");
                assert!(!chunk.contains(' '), "limit {limit}: {chunk:?}");
            }

            assert!(chunks.iter().all(|c| !c.trim().is_empty()));

            if limit > "Supercalifragilisticexpialidocious!".len() {
                let rejoined = chunks.join(" ");
                let words: Vec<_> = rejoined.split_whitespace().collect();
                let expected: Vec<_> = text.split_whitespace().collect();
                assert_eq!(words, expected, "limit {limit}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let input = ["You are in a maze", "of twisty little passages, all alike."];
        assert_eq!(packed(&input, 12), packed(&input, 12));
    }
}
