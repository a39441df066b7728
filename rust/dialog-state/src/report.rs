//! Per-batch bookkeeping for dialogues that could not be processed.

use serde::{Deserialize, Serialize};

use crate::error::DialogStateError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDialogue {
    pub dialogue_id: String,
    pub reason: String,
}

/// What a batch pass over the corpus did. A dialogue that fails is recorded
/// here and the pass moves on to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: Vec<SkippedDialogue>,
}

impl BatchReport {
    pub fn skip(&mut self, dialogue_id: &str, error: DialogStateError) {
        tracing::warn!(dialogue_id, %error, "skipping dialogue");
        self.skipped.push(SkippedDialogue {
            dialogue_id: dialogue_id.to_string(),
            reason: error.to_string(),
        });
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.skipped.extend(other.skipped);
    }
}
