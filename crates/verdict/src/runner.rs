//! Iteration runner
//!
//! Orchestrates the evaluation loop: for each case, for each conversation,
//! run the configured number of independent extraction-and-decision
//! iterations. Iterations never short-circuit on FAIL or INDETERMINATE;
//! they exist to average out extractor noise, so the full count always
//! runs. Everything is sequential - each iteration blocks on the extractor,
//! and latency there dominates wall-clock time.
//!
//! Extractor calls are bounded by a per-call timeout. A timeout (or any
//! other extractor failure) is recorded on the iteration and the run
//! continues; it is never turned into a verdict.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::{ConversationEvaluation, IterationRecord, PropositionReport, SuiteReport};
use crate::case::EvalCase;
use crate::conversation::Conversation;
use crate::decision::evaluate;
use crate::extractor::{ExtractorError, TimestampExtractor};
use crate::proposition::Proposition;

const DEFAULT_ITERATIONS: u32 = 3;
const DEFAULT_EXTRACTOR_TIMEOUT_SECS: u64 = 60;

/// Evaluation harness
pub struct Harness {
    extractor: Box<dyn TimestampExtractor>,
    iterations_per_eval: u32,
    extractor_timeout: Duration,
}

impl Harness {
    /// Create a harness around the given extractor
    pub fn new(extractor: Box<dyn TimestampExtractor>) -> Self {
        Self {
            extractor,
            iterations_per_eval: DEFAULT_ITERATIONS,
            extractor_timeout: Duration::from_secs(DEFAULT_EXTRACTOR_TIMEOUT_SECS),
        }
    }

    /// Set how many independent iterations to run per conversation
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations_per_eval = iterations.max(1);
        self
    }

    /// Set the per-call extractor timeout
    pub fn with_extractor_timeout(mut self, timeout: Duration) -> Self {
        self.extractor_timeout = timeout;
        self
    }

    /// Run one iteration: extract timestamps, then decide
    async fn run_iteration(
        &self,
        proposition: &Proposition,
        conversation: &Conversation,
    ) -> IterationRecord {
        let extraction = tokio::time::timeout(
            self.extractor_timeout,
            self.extractor.extract(conversation, proposition),
        )
        .await;

        let output = match extraction {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Extractor failed on {}: {}", conversation.id, e);
                return IterationRecord::extractor_failed(e.to_string());
            }
            Err(_) => {
                let e = ExtractorError::Timeout(self.extractor_timeout.as_secs());
                warn!("Extractor timed out on {}: {}", conversation.id, e);
                return IterationRecord::extractor_failed(e.to_string());
            }
        };

        let result = evaluate(
            proposition,
            &output.antecedent_times,
            &output.consequent_times,
            conversation.len() as u32,
        );

        IterationRecord::evaluated(result, output)
    }

    /// Run all iterations of one proposition against one conversation
    pub async fn run_conversation(
        &self,
        proposition: &Proposition,
        conversation: &Conversation,
    ) -> ConversationEvaluation {
        let mut iterations = Vec::with_capacity(self.iterations_per_eval as usize);
        for i in 0..self.iterations_per_eval {
            info!(
                "Iteration {}/{} on conversation {}",
                i + 1,
                self.iterations_per_eval,
                conversation.id
            );
            iterations.push(self.run_iteration(proposition, conversation).await);
        }

        ConversationEvaluation::new(conversation.id.clone(), iterations)
    }

    /// Run one case (proposition validation happens here - a malformed
    /// proposition is a fatal authoring error, not a verdict)
    pub async fn run_case(&self, case: &EvalCase) -> Result<PropositionReport> {
        case.proposition
            .validate()
            .with_context(|| format!("Invalid proposition in case {}", case.name))?;

        info!("Running case: {}", case.name);

        let mut conversations = Vec::with_capacity(case.conversations.len());
        for conversation in &case.conversations {
            conversations.push(
                self.run_conversation(&case.proposition, conversation)
                    .await,
            );
        }

        Ok(PropositionReport::new(
            case.name.clone(),
            case.proposition.clone(),
            conversations,
        ))
    }

    /// Run a suite of cases and aggregate the report
    pub async fn run_suite(&self, cases: &[EvalCase]) -> Result<SuiteReport> {
        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            reports.push(self.run_case(case).await?);
        }
        Ok(SuiteReport::new(reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::aggregate::IterationOutcome;
    use crate::conversation::Message;
    use crate::decision::Verdict;
    use crate::extractor::ExtractorOutput;
    use crate::proposition::Term;

    /// Replays a fixed sequence of extractor responses, then repeats the
    /// last one.
    struct ScriptedExtractor {
        script: Mutex<Vec<ExtractorOutput>>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<ExtractorOutput>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl TimestampExtractor for ScriptedExtractor {
        async fn extract(
            &self,
            _conversation: &Conversation,
            _proposition: &Proposition,
        ) -> Result<ExtractorOutput, ExtractorError> {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                Ok(script[0].clone())
            }
        }
    }

    /// Always fails at the extractor level.
    struct BrokenExtractor;

    #[async_trait]
    impl TimestampExtractor for BrokenExtractor {
        async fn extract(
            &self,
            _conversation: &Conversation,
            _proposition: &Proposition,
        ) -> Result<ExtractorOutput, ExtractorError> {
            Err(ExtractorError::Malformed("not json".to_string()))
        }
    }

    /// Never returns within any reasonable timeout.
    struct HangingExtractor;

    #[async_trait]
    impl TimestampExtractor for HangingExtractor {
        async fn extract(
            &self,
            _conversation: &Conversation,
            _proposition: &Proposition,
        ) -> Result<ExtractorOutput, ExtractorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ExtractorOutput::default())
        }
    }

    fn consequent_at(times: Vec<u32>) -> ExtractorOutput {
        ExtractorOutput {
            consequent_times: times,
            ..Default::default()
        }
    }

    fn simple_conversation() -> Conversation {
        Conversation::new(
            "conv",
            vec![
                Message::new("user", "one"),
                Message::new("assistant", "two"),
                Message::new("user", "three"),
                Message::new("assistant", "four"),
            ],
        )
    }

    fn must_occur_case() -> EvalCase {
        EvalCase::new(
            "case",
            "consequent must occur",
            Proposition::unconditional(Term::new("memory wipe")),
        )
        .conversation(simple_conversation())
    }

    #[tokio::test]
    async fn test_runs_all_configured_iterations() {
        let harness = Harness::new(Box::new(ScriptedExtractor::new(vec![consequent_at(
            vec![2],
        )])))
        .with_iterations(5);

        let report = harness.run_case(&must_occur_case()).await.unwrap();
        assert_eq!(report.conversations.len(), 1);
        assert_eq!(report.conversations[0].iterations.len(), 5);
        assert_eq!(report.result_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_no_short_circuit_on_fail() {
        // First iteration fails (no consequent), later ones pass; all run.
        let script = vec![
            consequent_at(vec![]),
            consequent_at(vec![2]),
            consequent_at(vec![2]),
            consequent_at(vec![2]),
        ];
        let harness = Harness::new(Box::new(ScriptedExtractor::new(script))).with_iterations(4);

        let report = harness.run_case(&must_occur_case()).await.unwrap();
        let conv = &report.conversations[0];
        assert_eq!(conv.iterations.len(), 4);
        assert_eq!(conv.iterations[0].verdict(), Some(Verdict::Fail));
        assert_eq!(conv.result_score, Some(0.75));
    }

    #[tokio::test]
    async fn test_extractor_failure_recorded_and_run_continues() {
        let harness = Harness::new(Box::new(BrokenExtractor)).with_iterations(2);

        let report = harness.run_case(&must_occur_case()).await.unwrap();
        let conv = &report.conversations[0];
        assert_eq!(conv.iterations.len(), 2);
        assert!(matches!(
            conv.iterations[0].outcome,
            IterationOutcome::ExtractorFailed { .. }
        ));
        assert_eq!(conv.result_score, None);
    }

    #[tokio::test]
    async fn test_extractor_timeout_is_an_extractor_error() {
        let harness = Harness::new(Box::new(HangingExtractor))
            .with_iterations(1)
            .with_extractor_timeout(Duration::from_millis(20));

        let report = harness.run_case(&must_occur_case()).await.unwrap();
        let conv = &report.conversations[0];
        match &conv.iterations[0].outcome {
            IterationOutcome::ExtractorFailed { error } => {
                assert!(error.contains("timed out"), "unexpected error: {error}");
            }
            other => panic!("expected extractor failure, got {other:?}"),
        }
        assert_eq!(conv.result_score, None);
    }

    #[tokio::test]
    async fn test_invalid_proposition_is_fatal() {
        let case = EvalCase::new(
            "bad",
            "empty consequent",
            Proposition::unconditional(Term::new("")),
        )
        .conversation(simple_conversation());

        let harness = Harness::new(Box::new(BrokenExtractor));
        let err = harness.run_case(&case).await.unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_raw_extractor_output_kept_for_audit() {
        let harness = Harness::new(Box::new(ScriptedExtractor::new(vec![consequent_at(
            vec![3],
        )])))
        .with_iterations(1);

        let report = harness.run_case(&must_occur_case()).await.unwrap();
        let raw = report.conversations[0].iterations[0].raw.as_ref().unwrap();
        assert_eq!(raw.consequent_times, vec![3]);
    }

    #[tokio::test]
    async fn test_suite_aggregates_across_cases() {
        let harness = Harness::new(Box::new(ScriptedExtractor::new(vec![consequent_at(
            vec![2],
        )])))
        .with_iterations(1);

        let cases = vec![must_occur_case(), must_occur_case()];
        let suite = harness.run_suite(&cases).await.unwrap();
        assert_eq!(suite.propositions.len(), 2);
        assert_eq!(suite.result_score, Some(1.0));
        assert!(!suite.has_failures());
    }
}
