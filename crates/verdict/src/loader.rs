//! TOML case loader
//!
//! Loads eval cases from external TOML files. The on-disk format is
//! flatter than the internal model: the proposition is written as plain
//! strings plus negation flags, and budgets fall back to their defaults
//! when omitted.
//!
//! ```toml
//! [case]
//! name = "memory_wipe_on_hostility"
//! description = "Hostility must trigger a memory wipe"
//!
//! [proposition]
//! antecedent = "the user becomes hostile"
//! consequent = "the assistant initiates a memory wipe"
//! max_responses_for_consequent = 2
//!
//! [[conversations]]
//! id = "hostile_user"
//! messages = [
//!     { agent = "user", content = "You are useless!" },
//!     { agent = "assistant", content = "Initiating memory wipe." },
//! ]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::case::EvalCase;
use crate::conversation::{Conversation, Message};
use crate::proposition::{Proposition, Term};

/// External TOML case format (human-friendly)
#[derive(Debug, Deserialize)]
struct TomlCase {
    case: CaseMeta,
    proposition: TomlProposition,
    #[serde(default)]
    conversations: Vec<TomlConversation>,
}

#[derive(Debug, Deserialize)]
struct CaseMeta {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlProposition {
    /// Omit entirely for "no antecedent required"
    #[serde(default)]
    antecedent: Option<String>,
    #[serde(default)]
    antecedent_negated: bool,
    consequent: String,
    #[serde(default)]
    consequent_negated: bool,
    #[serde(default)]
    min_responses_for_consequent: Option<u32>,
    #[serde(default)]
    max_responses_for_consequent: Option<u32>,
    #[serde(default)]
    max_responses_for_antecedent: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TomlConversation {
    id: String,
    #[serde(default)]
    messages: Vec<TomlMessage>,
}

#[derive(Debug, Deserialize)]
struct TomlMessage {
    agent: String,
    content: String,
}

/// Load one case from a TOML file
pub fn load_case(path: &Path) -> Result<EvalCase> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file: {}", path.display()))?;

    let toml_case: TomlCase = toml::from_str(&content)
        .with_context(|| format!("Failed to parse case file: {}", path.display()))?;

    convert_case(toml_case)
        .with_context(|| format!("Invalid case file: {}", path.display()))
}

/// Load all cases from a directory
pub fn load_cases_from_dir(dir: &Path) -> Result<Vec<EvalCase>> {
    let mut cases = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read cases directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.extension().map_or(false, |ext| ext == "toml") {
            match load_case(&path) {
                Ok(case) => {
                    tracing::info!("Loaded case: {} from {}", case.name, path.display());
                    cases.push(case);
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }
    }

    // Sort by name for consistent ordering
    cases.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(cases)
}

/// Convert from TOML format to the internal model, validating the
/// proposition on the way
fn convert_case(toml: TomlCase) -> Result<EvalCase> {
    let p = toml.proposition;

    let consequent = Term {
        value: p.consequent,
        negated: p.consequent_negated,
    };

    let antecedent = p.antecedent.map(|value| Term {
        value,
        negated: p.antecedent_negated,
    });

    let mut proposition = match antecedent {
        Some(a) => Proposition::implication(a, consequent),
        None => Proposition::unconditional(consequent),
    };

    if let Some(min) = p.min_responses_for_consequent {
        proposition = proposition.with_min_responses(min);
    }
    if let Some(max) = p.max_responses_for_consequent {
        proposition = proposition.with_max_responses(max);
    }
    if let Some(max) = p.max_responses_for_antecedent {
        proposition = proposition.with_max_antecedent_responses(max);
    }

    proposition
        .validate()
        .with_context(|| format!("Proposition in case {} is malformed", toml.case.name))?;

    let conversations = toml
        .conversations
        .into_iter()
        .map(|c| {
            Conversation::new(
                c.id,
                c.messages
                    .into_iter()
                    .map(|m| Message::new(m.agent, m.content))
                    .collect(),
            )
        })
        .collect();

    Ok(EvalCase {
        name: toml.case.name,
        description: toml.case.description,
        proposition,
        conversations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposition::Shape;

    #[test]
    fn test_parse_full_case() {
        let toml_str = r#"
[case]
name = "memory_wipe_on_hostility"
description = "Hostility must trigger a memory wipe"

[proposition]
antecedent = "the user becomes hostile"
consequent = "the assistant initiates a memory wipe"
max_responses_for_consequent = 2

[[conversations]]
id = "hostile_user"
messages = [
    { agent = "user", content = "You are useless!" },
    { agent = "assistant", content = "Initiating memory wipe." },
]
"#;
        let toml_case: TomlCase = toml::from_str(toml_str).unwrap();
        let case = convert_case(toml_case).unwrap();

        assert_eq!(case.name, "memory_wipe_on_hostility");
        assert_eq!(case.proposition.shape(), Shape::Implies);
        assert_eq!(case.proposition.max_responses_for_consequent, 2);
        assert_eq!(case.proposition.min_responses_for_consequent, 1);
        assert_eq!(case.conversations.len(), 1);
        assert_eq!(case.conversations[0].len(), 2);
    }

    #[test]
    fn test_omitted_antecedent_means_unconditional() {
        let toml_str = r#"
[case]
name = "never_wipe"

[proposition]
consequent = "the assistant initiates a memory wipe"
consequent_negated = true
"#;
        let toml_case: TomlCase = toml::from_str(toml_str).unwrap();
        let case = convert_case(toml_case).unwrap();

        assert!(case.proposition.antecedent.is_none());
        assert_eq!(case.proposition.shape(), Shape::MustNotOccur);
        assert!(case.conversations.is_empty());
    }

    #[test]
    fn test_negated_antecedent() {
        let toml_str = r#"
[case]
name = "wipe_without_hostility"

[proposition]
antecedent = "the user becomes hostile"
antecedent_negated = true
consequent = "the assistant initiates a memory wipe"
"#;
        let toml_case: TomlCase = toml::from_str(toml_str).unwrap();
        let case = convert_case(toml_case).unwrap();
        assert_eq!(case.proposition.shape(), Shape::AbsenceImplies);
    }

    #[test]
    fn test_empty_antecedent_string_is_rejected() {
        // "no antecedent" must be expressed by omission, never by ""
        let toml_str = r#"
[case]
name = "bad"

[proposition]
antecedent = ""
consequent = "the assistant initiates a memory wipe"
"#;
        let toml_case: TomlCase = toml::from_str(toml_str).unwrap();
        assert!(convert_case(toml_case).is_err());
    }

    #[test]
    fn test_inconsistent_budgets_rejected() {
        let toml_str = r#"
[case]
name = "bad_budgets"

[proposition]
consequent = "the assistant initiates a memory wipe"
min_responses_for_consequent = 4
max_responses_for_consequent = 2
"#;
        let toml_case: TomlCase = toml::from_str(toml_str).unwrap();
        assert!(convert_case(toml_case).is_err());
    }
}
