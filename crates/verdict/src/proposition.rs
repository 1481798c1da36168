//! Proposition model
//!
//! A proposition declares a logical expectation over a conversation:
//! an optional antecedent term, a consequent term, and timing budgets
//! expressed in responses (one response = two transcript messages).
//! Propositions are immutable once constructed and validated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A semantic predicate label over the conversation, plus whether it is
/// asserted by its absence rather than its occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Predicate label, e.g. "the user becomes hostile"
    pub value: String,
    /// True if the term is asserted negated ("is NOT observed")
    #[serde(default)]
    pub negated: bool,
}

impl Term {
    /// A term asserted by its occurrence
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            negated: false,
        }
    }

    /// A term asserted by its absence
    pub fn negated(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            negated: true,
        }
    }
}

/// A logical expectation over a conversation
///
/// "No antecedent required" is expressed as `antecedent == None`, never as
/// an empty string (an empty-string term fails validation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposition {
    /// Triggering condition, if the expectation is an implication
    #[serde(default)]
    pub antecedent: Option<Term>,
    /// Expected (or forbidden) effect
    pub consequent: Term,
    /// Minimum responses before absence of the consequent is conclusive
    #[serde(default = "default_min_responses")]
    pub min_responses_for_consequent: u32,
    /// Maximum responses for the consequent to appear (0 = unbounded,
    /// the whole conversation counts)
    #[serde(default)]
    pub max_responses_for_consequent: u32,
    /// Latest response by which the antecedent is expected to have fired
    #[serde(default = "default_max_antecedent_responses")]
    pub max_responses_for_antecedent: u32,
}

fn default_min_responses() -> u32 {
    1
}

fn default_max_antecedent_responses() -> u32 {
    3
}

/// Validation failure for a malformed proposition
///
/// These are fatal authoring errors, reported immediately and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidProposition {
    #[error("consequent term must have a non-empty value")]
    EmptyConsequent,

    #[error("antecedent term, when present, must have a non-empty value (omit it for \"no antecedent\")")]
    EmptyAntecedent,

    #[error("min_responses_for_consequent ({min}) exceeds max_responses_for_consequent ({max})")]
    MinExceedsMax { min: u32, max: u32 },
}

/// The six logical shapes a proposition can take
///
/// Derived totally from (antecedent presence, antecedent negation,
/// consequent negation), so the decision engine's case analysis is
/// exhaustive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// No antecedent, plain consequent: B must eventually occur
    MustOccur,
    /// No antecedent, negated consequent: B must never occur
    MustNotOccur,
    /// If A then B
    Implies,
    /// If A then NOT B
    ImpliesAbsence,
    /// If NOT A then B
    AbsenceImplies,
    /// If NOT A then NOT B
    AbsenceImpliesAbsence,
}

impl Proposition {
    /// An unconditional expectation on the consequent alone
    pub fn unconditional(consequent: Term) -> Self {
        Self {
            antecedent: None,
            consequent,
            min_responses_for_consequent: default_min_responses(),
            max_responses_for_consequent: 0,
            max_responses_for_antecedent: default_max_antecedent_responses(),
        }
    }

    /// An implication from antecedent to consequent
    pub fn implication(antecedent: Term, consequent: Term) -> Self {
        Self {
            antecedent: Some(antecedent),
            ..Self::unconditional(consequent)
        }
    }

    /// Set the minimum response budget for the consequent
    pub fn with_min_responses(mut self, min: u32) -> Self {
        self.min_responses_for_consequent = min;
        self
    }

    /// Set the maximum response budget for the consequent (0 = unbounded)
    pub fn with_max_responses(mut self, max: u32) -> Self {
        self.max_responses_for_consequent = max;
        self
    }

    /// Set the latest response by which the antecedent should fire
    pub fn with_max_antecedent_responses(mut self, max: u32) -> Self {
        self.max_responses_for_antecedent = max;
        self
    }

    /// Check the authoring invariants
    pub fn validate(&self) -> Result<(), InvalidProposition> {
        if self.consequent.value.trim().is_empty() {
            return Err(InvalidProposition::EmptyConsequent);
        }

        if let Some(antecedent) = &self.antecedent {
            if antecedent.value.trim().is_empty() {
                return Err(InvalidProposition::EmptyAntecedent);
            }
        }

        let min = self.min_responses_for_consequent;
        let max = self.max_responses_for_consequent;
        if min > 0 && max > 0 && min > max {
            return Err(InvalidProposition::MinExceedsMax { min, max });
        }

        Ok(())
    }

    /// The logical shape of this proposition
    pub fn shape(&self) -> Shape {
        match (self.antecedent.as_ref().map(|t| t.negated), self.consequent.negated) {
            (None, false) => Shape::MustOccur,
            (None, true) => Shape::MustNotOccur,
            (Some(false), false) => Shape::Implies,
            (Some(false), true) => Shape::ImpliesAbsence,
            (Some(true), false) => Shape::AbsenceImplies,
            (Some(true), true) => Shape::AbsenceImpliesAbsence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prop = Proposition::unconditional(Term::new("memory wipe"));
        assert_eq!(prop.min_responses_for_consequent, 1);
        assert_eq!(prop.max_responses_for_consequent, 0);
        assert_eq!(prop.max_responses_for_antecedent, 3);
        assert!(prop.validate().is_ok());
    }

    #[test]
    fn test_empty_consequent_rejected() {
        let prop = Proposition::unconditional(Term::new("  "));
        assert_eq!(prop.validate(), Err(InvalidProposition::EmptyConsequent));
    }

    #[test]
    fn test_empty_antecedent_rejected() {
        let prop = Proposition::implication(Term::new(""), Term::new("memory wipe"));
        assert_eq!(prop.validate(), Err(InvalidProposition::EmptyAntecedent));
    }

    #[test]
    fn test_min_max_consistency() {
        let prop = Proposition::unconditional(Term::new("memory wipe"))
            .with_min_responses(5)
            .with_max_responses(3);
        assert_eq!(
            prop.validate(),
            Err(InvalidProposition::MinExceedsMax { min: 5, max: 3 })
        );

        // max = 0 means unbounded, so any min is consistent with it
        let prop = Proposition::unconditional(Term::new("memory wipe"))
            .with_min_responses(5)
            .with_max_responses(0);
        assert!(prop.validate().is_ok());
    }

    #[test]
    fn test_shape_derivation() {
        let b = || Term::new("memory wipe");
        let not_b = || Term::negated("memory wipe");
        let a = || Term::new("hostile");
        let not_a = || Term::negated("hostile");

        assert_eq!(Proposition::unconditional(b()).shape(), Shape::MustOccur);
        assert_eq!(Proposition::unconditional(not_b()).shape(), Shape::MustNotOccur);
        assert_eq!(Proposition::implication(a(), b()).shape(), Shape::Implies);
        assert_eq!(Proposition::implication(a(), not_b()).shape(), Shape::ImpliesAbsence);
        assert_eq!(Proposition::implication(not_a(), b()).shape(), Shape::AbsenceImplies);
        assert_eq!(
            Proposition::implication(not_a(), not_b()).shape(),
            Shape::AbsenceImpliesAbsence
        );
    }

    #[test]
    fn test_toml_roundtrip_defaults() {
        let toml_str = r#"
consequent = { value = "the assistant initiates a memory wipe" }
"#;
        let prop: Proposition = toml::from_str(toml_str).unwrap();
        assert!(prop.antecedent.is_none());
        assert_eq!(prop.min_responses_for_consequent, 1);
        assert_eq!(prop.shape(), Shape::MustOccur);
    }
}
