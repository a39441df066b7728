//! Value-span extraction over a tokenized utterance.
//!
//! Two extractors locate a contiguous run of tokens to read as a slot value:
//!
//! - [`match_pattern`] anchors on a full [`ContextPattern`]. The `before`
//!   tokens must appear verbatim; the value is the shortest run that is
//!   immediately followed by the `after` tokens. An empty side anchors the
//!   value to that edge of the utterance, ignoring edge punctuation, so
//!   `in the <VALUE>` matches `"somewhere in the north."`.
//! - [`match_cues`] uses the single-token fallback table. A value starts
//!   after a known before-cue and runs until a terminator (end of text,
//!   punctuation or a known after-cue). Failing that, the single token in
//!   front of a known after-cue is taken.
//!
//! Spans never contain punctuation tokens and never exceed the caller's
//! token limit.

use std::collections::BTreeSet;
use std::ops::Range;

use crate::ruleset::{ContextPattern, CueTable};
use crate::token::Token;

/// A run of tokens read as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpan {
    /// The token values joined by single spaces.
    pub text: String,
    /// Token positions included in this span.
    pub token_range: Range<usize>,
}

impl ValueSpan {
    fn new(tokens: &[Token], token_range: Range<usize>) -> Self {
        let text = tokens[token_range.clone()]
            .iter()
            .map(|token| token.value.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        ValueSpan { text, token_range }
    }
}

/// A fallback match and the count of the cue that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueMatch {
    pub span: ValueSpan,
    pub count: usize,
}

fn matches_at(tokens: &[Token], at: usize, words: &[String]) -> bool {
    at + words.len() <= tokens.len()
        && tokens[at..at + words.len()]
            .iter()
            .zip(words)
            .all(|(token, word)| &token.value == word)
}

fn content_bounds(tokens: &[Token]) -> Range<usize> {
    let start = tokens
        .iter()
        .position(|token| !token.is_punctuation())
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|token| !token.is_punctuation())
        .map_or(start, |index| index + 1);
    start..end
}

fn is_stop_word(token: &Token, stop_words: &BTreeSet<String>) -> bool {
    stop_words.contains(&token.value)
}

/// Find the first span `pattern` extracts from `tokens`, scanning left to
/// right over occurrences of the `before` context.
pub fn match_pattern(
    tokens: &[Token],
    pattern: &ContextPattern,
    max_tokens: usize,
) -> Option<ValueSpan> {
    let bounds = content_bounds(tokens);

    let starts: Vec<usize> = if pattern.before.is_empty() {
        vec![bounds.start]
    } else {
        (0..tokens.len())
            .filter(|at| matches_at(tokens, *at, &pattern.before))
            .map(|at| at + pattern.before.len())
            .collect()
    };

    for start in starts {
        if pattern.after.is_empty() {
            let end = bounds.end;
            let plausible = end > start
                && end - start <= max_tokens
                && !tokens[start..end].iter().any(Token::is_punctuation);
            if plausible {
                return Some(ValueSpan::new(tokens, start..end));
            }
            continue;
        }

        let limit = (start + max_tokens).min(tokens.len());
        for end in start + 1..=limit {
            if tokens[end - 1].is_punctuation() {
                break;
            }
            if matches_at(tokens, end, &pattern.after) {
                return Some(ValueSpan::new(tokens, start..end));
            }
        }
    }

    None
}

/// Find a value through single-token cues, trying the most frequent
/// before-cues first and after-cues only when no before-cue yields a span.
/// A span made only of `stop_words` is never a value.
pub fn match_cues(
    tokens: &[Token],
    cues: &CueTable,
    max_tokens: usize,
    stop_words: &BTreeSet<String>,
) -> Option<CueMatch> {
    for (cue, count) in cues.ranked_before() {
        for at in (0..tokens.len()).filter(|at| tokens[*at].value == cue) {
            if let Some(span) = span_after_cue(tokens, at + 1, cues, max_tokens, stop_words) {
                return Some(CueMatch { span, count });
            }
        }
    }

    for (cue, count) in cues.ranked_after() {
        for at in (1..tokens.len()).filter(|at| tokens[*at].value == cue) {
            let candidate = &tokens[at - 1];
            if !candidate.is_punctuation() && !is_stop_word(candidate, stop_words) {
                return Some(CueMatch {
                    span: ValueSpan::new(tokens, at - 1..at),
                    count,
                });
            }
        }
    }

    None
}

fn span_after_cue(
    tokens: &[Token],
    start: usize,
    cues: &CueTable,
    max_tokens: usize,
    stop_words: &BTreeSet<String>,
) -> Option<ValueSpan> {
    let limit = (start + max_tokens).min(tokens.len());
    for end in start + 1..=limit {
        if tokens[end - 1].is_punctuation() {
            return None;
        }
        let terminated = end == tokens.len()
            || tokens[end].is_punctuation()
            || cues.after.contains_key(&tokens[end].value);
        if terminated {
            if tokens[start..end]
                .iter()
                .all(|token| is_stop_word(token, stop_words))
            {
                return None;
            }
            return Some(ValueSpan::new(tokens, start..end));
        }
    }
    None
}
