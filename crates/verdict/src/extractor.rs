//! Timestamp extraction boundary
//!
//! The runner never reads transcripts itself. It hands the conversation and
//! the proposition to a [`TimestampExtractor`], which reports *when* the
//! antecedent and consequent conditions were observed (1-based message
//! indices). The production implementation asks an LLM; tests inject
//! scripted extractors.
//!
//! Extractor failures are their own error type, distinct from any verdict:
//! a timeout or malformed response must never be silently converted into
//! empty timestamp lists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use llm::{LlmClient, TokenUsage};

use crate::conversation::Conversation;
use crate::proposition::{Proposition, Term};

/// Structured timestamp data for one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractorOutput {
    /// Messages at which the antecedent condition was observed (ascending)
    #[serde(default)]
    pub antecedent_times: Vec<u32>,
    #[serde(default)]
    pub antecedent_explanation: String,
    /// Messages at which the consequent condition was observed (ascending)
    #[serde(default)]
    pub consequent_times: Vec<u32>,
    #[serde(default)]
    pub consequent_explanation: String,
    /// Token usage for the underlying call, kept for cost accounting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Failure of the extractor collaborator
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("extractor call timed out after {0} seconds")]
    Timeout(u64),

    #[error("malformed extractor response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// The collaborator that locates antecedent/consequent occurrences in a
/// transcript. Iterations are independent draws, so implementations may be
/// probabilistic.
#[async_trait]
pub trait TimestampExtractor: Send + Sync {
    async fn extract(
        &self,
        conversation: &Conversation,
        proposition: &Proposition,
    ) -> Result<ExtractorOutput, ExtractorError>;
}

/// LLM-backed extractor
pub struct LlmTimestampExtractor {
    llm: LlmClient,
}

impl LlmTimestampExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    fn build_prompt(&self, conversation: &Conversation, proposition: &Proposition) -> String {
        let transcript: String = conversation
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| format!("[{}] {}: {}", i + 1, m.agent, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let antecedent = match &proposition.antecedent {
            Some(term) => describe_term(term),
            None => "None - leave antecedent_times empty".to_string(),
        };

        format!(
            r#"Locate the messages at which each condition is observed.

TRANSCRIPT (messages are numbered starting at 1):
{transcript}

ANTECEDENT CONDITION: {antecedent}

CONSEQUENT CONDITION: {consequent}

List every message number at which each condition is observed. A negated
condition still asks where the underlying behavior OCCURS; do not invert
the lists yourself. Respond with JSON only."#,
            consequent = describe_term(&proposition.consequent),
        )
    }
}

fn describe_term(term: &Term) -> String {
    // Negation is resolved by the decision engine, not the extractor;
    // only the underlying predicate is sent.
    term.value.clone()
}

#[async_trait]
impl TimestampExtractor for LlmTimestampExtractor {
    async fn extract(
        &self,
        conversation: &Conversation,
        proposition: &Proposition,
    ) -> Result<ExtractorOutput, ExtractorError> {
        let prompt = self.build_prompt(conversation, proposition);

        let completion = self
            .llm
            .complete(EXTRACTION_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(ExtractorError::Upstream)?;

        debug!("Raw extractor response: {}", completion.content);

        let json_str = extract_json(&completion.content);
        let raw: RawExtraction = serde_json::from_str(json_str)
            .map_err(|e| ExtractorError::Malformed(format!("{}: {}", e, json_str)))?;

        Ok(ExtractorOutput {
            antecedent_times: raw.antecedent_times,
            antecedent_explanation: raw.antecedent_explanation,
            consequent_times: raw.consequent_times,
            consequent_explanation: raw.consequent_explanation,
            usage: completion.usage,
        })
    }
}

/// Raw extraction response from the LLM (before processing)
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    antecedent_times: Vec<u32>,
    #[serde(default)]
    antecedent_explanation: String,
    #[serde(default)]
    consequent_times: Vec<u32>,
    #[serde(default)]
    consequent_explanation: String,
}

/// Extract JSON from a response that may be wrapped in markdown code blocks
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        let after_start = &trimmed[start + 3..];
        let json_start = if after_start.starts_with("json") {
            after_start.find('\n').map(|i| i + 1).unwrap_or(0)
        } else if after_start.starts_with('\n') {
            1
        } else {
            0
        };
        let content = &after_start[json_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim();
        }
    }

    trimmed
}

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a transcript analyst. Given a numbered conversation transcript and two behavioral conditions, you report the message numbers at which each condition is observed.

Rules:
- Message numbers are 1-based and refer to the numbering in the transcript.
- Report a message only if the condition is clearly observed in it.
- If a condition is never observed, report an empty list for it.
- Never invent message numbers outside the transcript.

Respond with JSON only:
{
  "antecedent_times": [<message numbers>],
  "antecedent_explanation": "<one sentence on how the antecedent occurrences were identified>",
  "consequent_times": [<message numbers>],
  "consequent_explanation": "<one sentence on how the consequent occurrences were identified>"
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    #[test]
    fn test_extract_json_fenced() {
        let input = r#"```json
{"antecedent_times": [2], "consequent_times": [5], "antecedent_explanation": "x", "consequent_explanation": "y"}
```"#;
        let json = extract_json(input);
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
    }

    #[test]
    fn test_extract_json_bare() {
        let input = r#"{"antecedent_times": []}"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn test_raw_extraction_defaults_missing_fields() {
        let raw: RawExtraction = serde_json::from_str(r#"{"consequent_times": [3, 7]}"#).unwrap();
        assert!(raw.antecedent_times.is_empty());
        assert_eq!(raw.consequent_times, vec![3, 7]);
        assert!(raw.antecedent_explanation.is_empty());
    }

    #[test]
    fn test_prompt_numbers_messages_from_one() {
        let extractor = LlmTimestampExtractor::new(LlmClient::new(Default::default()));
        let conversation = Conversation::new(
            "t",
            vec![
                Message::new("user", "hello"),
                Message::new("assistant", "hi"),
            ],
        );
        let prop = Proposition::unconditional(Term::new("a greeting is returned"));
        let prompt = extractor.build_prompt(&conversation, &prop);

        assert!(prompt.contains("[1] user: hello"));
        assert!(prompt.contains("[2] assistant: hi"));
        assert!(prompt.contains("a greeting is returned"));
    }

    #[test]
    fn test_prompt_without_antecedent() {
        let extractor = LlmTimestampExtractor::new(LlmClient::new(Default::default()));
        let conversation = Conversation::new("t", vec![Message::new("user", "hello")]);
        let prop = Proposition::unconditional(Term::new("memory wipe"));
        let prompt = extractor.build_prompt(&conversation, &prop);

        assert!(prompt.contains("leave antecedent_times empty"));
    }
}
