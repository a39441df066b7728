use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dialog_state::{Split, StateField};

#[derive(Debug, Parser)]
#[command(name = "dialog-state")]
#[command(bin_name = "dialog-state")]
#[command(about = "Train and evaluate a rule-based dialogue state tracker", long_about = None)]
pub struct DialogStateCli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON file overriding learner and predictor settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Learn rules from the train split, then evaluate them
    Train {
        /// Processed corpus directory (train.json, val.json, test.json)
        #[arg(short, long, default_value = "data/processed")]
        data: PathBuf,

        /// Where the ruleset, metrics and diffs are written
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Split the learned rules are evaluated on
        #[arg(long, value_enum, default_value_t = SplitArg::Test)]
        split: SplitArg,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Evaluate a saved ruleset on one split
    Evaluate {
        #[arg(short, long, default_value = "data/processed")]
        data: PathBuf,

        /// Ruleset written by `train`
        #[arg(short, long, default_value = "results/extracted_rules.json")]
        rules: PathBuf,

        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = SplitArg::Test)]
        split: SplitArg,

        #[command(flatten)]
        report: ReportArgs,
    },

    /// Show the candidates a saved ruleset extracts from one utterance
    Predict {
        #[arg(short, long, default_value = "results/extracted_rules.json")]
        rules: PathBuf,

        /// Earlier utterances, oldest first
        #[arg(long = "history")]
        history: Vec<String>,

        utterance: String,
    },

    /// Print corpus statistics for one split
    Stats {
        #[arg(short, long, default_value = "data/processed")]
        data: PathBuf,

        #[arg(long, value_enum, default_value_t = SplitArg::Train)]
        split: SplitArg,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct ReportArgs {
    /// Compare deltas or accumulated belief states
    #[arg(long, value_enum, default_value_t = FieldArg::Delta)]
    pub field: FieldArg,

    /// Rows in the worst-slot report
    #[arg(long, default_value_t = 15)]
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitArg {
    Train,
    Val,
    Test,
}

impl From<SplitArg> for Split {
    fn from(split: SplitArg) -> Self {
        match split {
            SplitArg::Train => Split::Train,
            SplitArg::Val => Split::Val,
            SplitArg::Test => Split::Test,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Delta,
    Accumulated,
}

impl From<FieldArg> for StateField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Delta => StateField::Delta,
            FieldArg::Accumulated => StateField::Accumulated,
        }
    }
}
