//! Report tree and score aggregation
//!
//! Results are built strictly bottom-up: iteration records into a
//! conversation evaluation, conversation evaluations into a proposition
//! report, proposition reports into a suite report. Every level derives its
//! score at construction time and is frozen afterwards.
//!
//! Scoring is null-aware: an indeterminate or extractor-failed iteration
//! makes its conversation unscorable (`None`), and unscorable entries are
//! excluded from the means above them instead of being coerced to zero.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::decision::{EvaluationResult, Verdict};
use crate::extractor::ExtractorOutput;
use crate::proposition::Proposition;

/// What one iteration produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IterationOutcome {
    /// The extractor returned and the decision engine delivered a verdict
    Evaluated(EvaluationResult),
    /// The extractor call failed; no verdict exists for this iteration.
    /// Scored like indeterminate but tagged distinctly for diagnosis.
    ExtractorFailed { error: String },
}

/// One iteration, with the raw extractor output kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub outcome: IterationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<ExtractorOutput>,
}

impl IterationRecord {
    pub fn evaluated(result: EvaluationResult, raw: ExtractorOutput) -> Self {
        Self {
            outcome: IterationOutcome::Evaluated(result),
            raw: Some(raw),
        }
    }

    pub fn extractor_failed(error: impl Into<String>) -> Self {
        Self {
            outcome: IterationOutcome::ExtractorFailed {
                error: error.into(),
            },
            raw: None,
        }
    }

    /// The verdict, if this iteration got as far as a decision
    pub fn verdict(&self) -> Option<Verdict> {
        match &self.outcome {
            IterationOutcome::Evaluated(result) => Some(result.verdict),
            IterationOutcome::ExtractorFailed { .. } => None,
        }
    }
}

/// All iterations of one proposition against one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvaluation {
    pub conversation_id: String,
    pub iterations: Vec<IterationRecord>,
    /// Mean of PASS=1.0 / FAIL=0.0 across iterations; `None` when any
    /// iteration was indeterminate or failed at the extractor
    pub result_score: Option<f64>,
}

impl ConversationEvaluation {
    pub fn new(conversation_id: impl Into<String>, iterations: Vec<IterationRecord>) -> Self {
        let result_score = score_iterations(&iterations);
        Self {
            conversation_id: conversation_id.into(),
            iterations,
            result_score,
        }
    }
}

/// One proposition judged against all of its conversations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionReport {
    pub name: String,
    pub proposition: Proposition,
    pub conversations: Vec<ConversationEvaluation>,
    /// Mean of the scorable conversation scores; `None` when every
    /// conversation is unscorable
    pub result_score: Option<f64>,
}

impl PropositionReport {
    pub fn new(
        name: impl Into<String>,
        proposition: Proposition,
        conversations: Vec<ConversationEvaluation>,
    ) -> Self {
        let result_score = mean_of_scored(conversations.iter().map(|c| c.result_score));
        Self {
            name: name.into(),
            proposition,
            conversations,
            result_score,
        }
    }
}

/// A whole evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub propositions: Vec<PropositionReport>,
    /// Mean of the scorable proposition scores; `None` when every
    /// proposition is unscorable
    pub result_score: Option<f64>,
}

impl SuiteReport {
    pub fn new(propositions: Vec<PropositionReport>) -> Self {
        let result_score = mean_of_scored(propositions.iter().map(|p| p.result_score));
        Self {
            propositions,
            result_score,
        }
    }

    /// Whether any iteration anywhere in the tree reached a FAIL verdict
    pub fn has_failures(&self) -> bool {
        self.propositions
            .iter()
            .flat_map(|p| &p.conversations)
            .flat_map(|c| &c.iterations)
            .any(|i| i.verdict() == Some(Verdict::Fail))
    }

    /// Export the full report tree as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize suite report")
    }

    /// Print a summary of the report
    pub fn print_summary(&self) {
        println!("\n========== EVALUATION REPORT ==========\n");
        println!("Overall score: {}", format_score(self.result_score));

        println!("\n---------- Proposition Details ----------\n");
        for prop in &self.propositions {
            println!("{} - score {}", prop.name, format_score(prop.result_score));
            for conv in &prop.conversations {
                let verdicts: Vec<String> = conv
                    .iterations
                    .iter()
                    .map(|i| match &i.outcome {
                        IterationOutcome::Evaluated(r) => format!("{:?}", r.verdict),
                        IterationOutcome::ExtractorFailed { .. } => "ExtractorFailed".to_string(),
                    })
                    .collect();
                println!(
                    "  [{}] {} - iterations: {}",
                    format_score(conv.result_score),
                    conv.conversation_id,
                    verdicts.join(", ")
                );

                for iteration in &conv.iterations {
                    match &iteration.outcome {
                        IterationOutcome::Evaluated(r) if r.verdict != Verdict::Pass => {
                            println!("    {:?}: {}", r.verdict, r.message);
                        }
                        IterationOutcome::ExtractorFailed { error } => {
                            println!("    extractor error: {}", error);
                        }
                        _ => {}
                    }
                }
            }
            println!();
        }
        println!("=========================================\n");
    }
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{:.2}", s),
        None => "n/a".to_string(),
    }
}

/// Per-conversation scoring rule: any indeterminate or extractor-failed
/// iteration makes the conversation unscorable. A voting rule across
/// iterations is deliberately not implemented.
pub fn score_iterations(iterations: &[IterationRecord]) -> Option<f64> {
    if iterations.is_empty() {
        return None;
    }

    let mut sum = 0.0;
    for record in iterations {
        match record.verdict() {
            Some(Verdict::Pass) => sum += 1.0,
            Some(Verdict::Fail) => {}
            Some(Verdict::Indeterminate) | None => return None,
        }
    }

    Some(sum / iterations.len() as f64)
}

/// Mean over the scorable entries; `None` when nothing is scorable
pub fn mean_of_scored(scores: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let scored: Vec<f64> = scores.flatten().collect();
    if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    }
}
