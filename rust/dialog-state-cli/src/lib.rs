//! # Dialog State CLI
//!
//! Command line driver for the rule-based dialogue state tracker in
//! `dialog-state`.
//!
//! ## Usage
//!
//! Learn rules from `data/processed/train.json` and evaluate them on the
//! test split, writing every artifact to `results/`:
//!
//! ```bash
//! cargo run --bin dialog-state -- train --data data/processed --output results
//! ```
//!
//! Re-evaluate a saved ruleset on the validation split, comparing
//! accumulated states instead of deltas:
//!
//! ```bash
//! cargo run --bin dialog-state -- evaluate --split val --field accumulated
//! ```
//!
//! Inspect what the rules extract from one utterance:
//!
//! ```bash
//! cargo run --bin dialog-state -- predict "i need a cheap hotel in the east"
//! ```
//!
//! Log verbosity follows `RUST_LOG`; `-v` defaults it to `debug`.

mod cli;
pub use cli::*;

mod commands;
pub use commands::*;

mod logging;
pub use logging::*;
