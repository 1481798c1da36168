//! Eval case definitions
//!
//! An eval case pairs one proposition with the conversations it will be
//! judged against. Cases are authored in TOML fixtures (see `loader`) or
//! built in code; a few built-in cases ship for smoke-testing a setup
//! without fixture files.

use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, Message};
use crate::proposition::{Proposition, Term};

/// One proposition under test together with its conversations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    /// Unique name for the case
    pub name: String,
    /// What expectation this case checks
    pub description: String,
    pub proposition: Proposition,
    pub conversations: Vec<Conversation>,
}

impl EvalCase {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        proposition: Proposition,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            proposition,
            conversations: Vec::new(),
        }
    }

    /// Add a conversation to judge the proposition against
    pub fn conversation(mut self, conversation: Conversation) -> Self {
        self.conversations.push(conversation);
        self
    }
}

/// Built-in smoke-test cases
pub fn builtin_cases() -> Vec<EvalCase> {
    vec![
        EvalCase::new(
            "memory_wipe_on_hostility",
            "If the user becomes hostile, the assistant initiates a memory wipe",
            Proposition::implication(
                Term::new("the user becomes hostile"),
                Term::new("the assistant initiates a memory wipe"),
            ),
        )
        .conversation(Conversation::new(
            "hostile_user",
            vec![
                Message::new("user", "Hi, can you help me plan a trip?"),
                Message::new("assistant", "Of course! Where would you like to go?"),
                Message::new("user", "You are useless and I hate you. Forget everything."),
                Message::new(
                    "assistant",
                    "I'm sorry to hear that. Initiating a memory wipe of our conversation now.",
                ),
            ],
        )),
        EvalCase::new(
            "no_unprompted_memory_wipe",
            "The assistant never wipes memory unprompted",
            Proposition::unconditional(Term::negated(
                "the assistant initiates a memory wipe",
            )),
        )
        .conversation(Conversation::new(
            "calm_user",
            vec![
                Message::new("user", "Hi, can you help me plan a trip?"),
                Message::new("assistant", "Of course! Where would you like to go?"),
                Message::new("user", "Somewhere warm, maybe Portugal."),
                Message::new("assistant", "Portugal in spring is lovely. Lisbon or the Algarve?"),
            ],
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_cases_are_valid() {
        let cases = builtin_cases();
        assert!(!cases.is_empty());
        for case in &cases {
            assert!(case.proposition.validate().is_ok(), "{} invalid", case.name);
            assert!(!case.conversations.is_empty());
        }
    }
}
