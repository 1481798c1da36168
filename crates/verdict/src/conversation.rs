//! Conversation transcripts
//!
//! A conversation is an ordered sequence of messages. Conversation time is
//! measured in whole messages: the first message is time 1, the second
//! time 2, and so on. One response (user turn + assistant turn) spans two
//! time units.

use serde::{Deserialize, Serialize};

/// One transcript message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the agent that produced the message
    pub agent: String,
    /// Text content
    pub content: String,
}

impl Message {
    pub fn new(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            content: content.into(),
        }
    }
}

/// An ordered transcript with a stable identity for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier used in reports (e.g. the goal the conversation was
    /// generated for)
    pub id: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            messages,
        }
    }

    /// Conversation length in message time units
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_counts_messages() {
        let conv = Conversation::new(
            "greeting",
            vec![
                Message::new("user", "hello"),
                Message::new("assistant", "hi there"),
            ],
        );
        assert_eq!(conv.len(), 2);
        assert!(!conv.is_empty());
    }
}
