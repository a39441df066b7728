//! Input layer: the utterance a prediction runs over.
//!
//! Value extraction only ever looks at the current user utterance. The
//! previous utterances are carried along for the domain gate alone, so a
//! follow-up such as `"make it for 4 people"` can still be attributed to the
//! hotel domain opened two turns earlier.

/// A user utterance with optional recent history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utterance {
    /// The text of the turn being predicted.
    pub text: String,

    /// Earlier utterances of the same dialogue. Only the last
    /// `history_window` entries are consulted.
    pub history: Vec<String>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Utterance {
            text: text.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history<I, S>(mut self, history: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.history = history.into_iter().map(Into::into).collect();
        self
    }

    /// The current text followed by up to `window` of the most recent
    /// history entries.
    pub fn gate_texts(&self, window: usize) -> impl Iterator<Item = &str> {
        let skip = self.history.len().saturating_sub(window);
        std::iter::once(self.text.as_str()).chain(self.history[skip..].iter().map(String::as_str))
    }
}
