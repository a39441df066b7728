//! Tokenization shared by rule mining and prediction.
//!
//! Both sides of the pipeline must cut text the same way, otherwise a mined
//! context pattern can never match at inference time. Text is lowercased and
//! split on whitespace; leading and trailing punctuation is peeled off each
//! whitespace chunk into tokens of its own, so `"east."` becomes `east` and
//! `.`, while inner punctuation (`17:15`, `guest-house`, `don't`) is kept.

use std::collections::BTreeSet;

/// A single token extracted from input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token's text value, lowercased for matching.
    pub value: String,
    /// Zero-based position in the token sequence.
    pub position: usize,
    /// What kind of token this is.
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A word token (contains at least one letter).
    Word,
    /// A numeric token, including times such as `17:15`.
    Number,
    /// A run of punctuation.
    Punctuation,
}

impl Token {
    pub fn is_punctuation(&self) -> bool {
        self.kind == TokenKind::Punctuation
    }
}

fn classify(chunk: &str) -> TokenKind {
    if chunk.chars().all(|c| !c.is_alphanumeric()) {
        TokenKind::Punctuation
    } else if chunk.chars().any(char::is_alphabetic) {
        TokenKind::Word
    } else {
        TokenKind::Number
    }
}

fn is_edge_punctuation(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Tokenize text into lowercase tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let lowered = text.to_lowercase();
    let mut pieces: Vec<&str> = Vec::new();

    for chunk in lowered.split_whitespace() {
        let core_start = chunk.find(|c: char| !is_edge_punctuation(c));
        let Some(core_start) = core_start else {
            pieces.push(chunk);
            continue;
        };
        // exclusive end of the last non-punctuation char
        let core_end = chunk
            .char_indices()
            .rev()
            .find(|(_, c)| !is_edge_punctuation(*c))
            .map(|(index, c)| index + c.len_utf8())
            .unwrap_or(chunk.len());

        if core_start > 0 {
            pieces.push(&chunk[..core_start]);
        }
        pieces.push(&chunk[core_start..core_end]);
        if core_end < chunk.len() {
            pieces.push(&chunk[core_end..]);
        }
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(position, piece)| Token {
            value: piece.to_string(),
            position,
            kind: classify(piece),
        })
        .collect()
}

/// Token values only.
pub fn token_values(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|token| token.value).collect()
}

/// Words filtered out of keyword statistics.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "you", "can", "would", "like", "want", "need", "that", "this", "are",
    "with", "have", "will", "please", "thank", "thanks", "there", "what", "also", "yes", "not",
    "any", "get", "but", "just", "about", "from", "all", "its", "was", "how", "does", "could",
];

/// The distinct content words of `text`: word or number tokens longer than
/// `min_len - 1` characters that are not stop words.
pub fn content_words(
    text: &str,
    min_len: usize,
    stop_words: &BTreeSet<String>,
) -> BTreeSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|token| !token.is_punctuation())
        .filter(|token| token.value.chars().count() >= min_len)
        .filter(|token| !stop_words.contains(&token.value))
        .map(|token| token.value)
        .collect()
}
