use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use dialog_state::{
    Config, Corpus, Dialogue, Evaluator, PredictionDiffRecorder, RuleBasedPredictor, RuleLearner,
    Ruleset, Split, StateField, Utterance, corpus_stats, load_dialogues,
};
use serde::Serialize;

use crate::cli::{Command, DialogStateCli, ReportArgs};

pub const RULES_FILE: &str = "extracted_rules.json";
pub const METRICS_FILE: &str = "rule_based_metrics.json";
pub const PREDICTIONS_FILE: &str = "rule_based_predictions.json";
pub const ERROR_ANALYSIS_FILE: &str = "rule_based_error_analysis.json";

pub fn run(cli: DialogStateCli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Train {
            data,
            output,
            split,
            report,
        } => {
            let corpus = Corpus::load(&data).context("loading corpus")?;
            let learned = RuleLearner::new(config.learner).learn(&corpus.train);
            fs::create_dir_all(&output).with_context(|| format!("creating {}", output.display()))?;
            learned.ruleset.save(output.join(RULES_FILE))?;

            let mut predictor = RuleBasedPredictor::new(learned.ruleset, config.predictor);
            if let Some(ontology) = corpus.ontology.clone() {
                predictor = predictor.with_ontology(ontology);
            }
            evaluate(&predictor, &corpus, split.into(), &output, &report)
        }
        Command::Evaluate {
            data,
            rules,
            output,
            split,
            report,
        } => {
            let corpus = Corpus::load(&data).context("loading corpus")?;
            let ruleset = load_ruleset(&rules)?;
            let mut predictor = RuleBasedPredictor::new(ruleset, config.predictor);
            if let Some(ontology) = corpus.ontology.clone() {
                predictor = predictor.with_ontology(ontology);
            }
            fs::create_dir_all(&output).with_context(|| format!("creating {}", output.display()))?;
            evaluate(&predictor, &corpus, split.into(), &output, &report)
        }
        Command::Predict {
            rules,
            history,
            utterance,
        } => {
            let ruleset = load_ruleset(&rules)?;
            let predictor = RuleBasedPredictor::new(ruleset, config.predictor);
            let utterance = Utterance::new(utterance).with_history(history);

            println!("open domains: {:?}", predictor.open_domains(&utterance));
            for candidate in predictor.candidates(&utterance) {
                println!("  {candidate}");
            }
            println!("{}", serde_json::to_string_pretty(&predictor.predict(&utterance))?);
            Ok(())
        }
        Command::Stats { data, split } => {
            let split: Split = split.into();
            let dialogues = load_dialogues(data.join(split.file_name()))?;
            println!("{}", serde_json::to_string_pretty(&corpus_stats(&dialogues))?);
            Ok(())
        }
    }
}

fn evaluate(
    predictor: &RuleBasedPredictor,
    corpus: &Corpus,
    split: Split,
    output: &Path,
    report: &ReportArgs,
) -> Result<()> {
    let field: StateField = report.field.into();
    let truth: &[Dialogue] = corpus.split(split);
    let inference = predictor.predict_corpus(truth);

    let mut evaluator = Evaluator::new().with_field(field);
    let summary = evaluator.evaluate_dataset(&inference.dialogues, truth);
    write_json(&output.join(METRICS_FILE), &summary)?;

    let metadata = serde_json::json!({
        "model": "rule_based",
        "split": split.file_name(),
        "field": field,
        "rules": predictor.ruleset().rule_count(),
        "skipped_dialogues": &inference.report.skipped,
        "metrics": &summary,
    });
    let diff = PredictionDiffRecorder::new(metadata)
        .with_field(field)
        .record(&inference.dialogues, truth);
    diff.save(output.join(PREDICTIONS_FILE))?;

    let analysis = diff.error_analysis();
    write_json(&output.join(ERROR_ANALYSIS_FILE), &analysis)?;

    println!("{}", "=".repeat(70));
    println!("{:<26}{:>10}", "Total turns:", summary.total_turns);
    println!(
        "{:<26}{:>10} ({:.2}%)",
        "Perfect turns:",
        summary.perfect_turns,
        summary.perfect_turn_ratio * 100.0
    );
    println!("{:<26}{:>9.2}%", "Joint goal accuracy:", summary.joint_goal_accuracy * 100.0);
    println!("{:<26}{:>9.2}%", "Slot accuracy:", summary.slot_accuracy * 100.0);
    println!("{:<26}{:>9.2}%", "Precision:", summary.precision * 100.0);
    println!("{:<26}{:>9.2}%", "Recall:", summary.recall * 100.0);
    println!("{:<26}{:>9.2}%", "F1 score:", summary.f1_score * 100.0);
    println!("{}", "-".repeat(70));
    println!("{:<30} {:>10} {:>10} {:>10}", "Slot", "Correct", "Total", "Accuracy");
    for row in evaluator.metrics().worst_slots(report.top_k) {
        println!(
            "{:<30} {:>10} {:>10} {:>9.2}%",
            row.slot.as_str(),
            row.correct,
            row.total,
            row.accuracy * 100.0
        );
    }
    println!("{}", "-".repeat(70));
    println!(
        "{:<26}{:>10}  (accuracy {:.2}%)",
        "Slot errors:",
        analysis.total_errors,
        analysis.accuracy * 100.0
    );
    for (kind, count) in &analysis.error_types {
        println!("  {:<24}{:>10}", serde_json::to_string(kind)?.trim_matches('"'), count);
    }
    println!("{}", "=".repeat(70));
    Ok(())
}

fn load_ruleset(path: &Path) -> Result<Ruleset> {
    Ruleset::load(path).with_context(|| format!("loading ruleset {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), "wrote report");
    Ok(())
}
