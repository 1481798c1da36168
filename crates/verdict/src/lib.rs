//! Behavioral test oracle for conversational agents
//!
//! Given a transcript and a declared logical expectation ("if the user
//! becomes hostile, the assistant initiates a memory wipe"), decides
//! whether the expectation held, failed, or cannot yet be judged.
//!
//! ## Pipeline
//!
//! - **Proposition**: immutable antecedent/consequent terms with timing
//!   budgets (`proposition`).
//! - **Decision engine**: pure function from extracted timestamps to a
//!   PASS / FAIL / INDETERMINATE verdict (`decision`).
//! - **Runner**: drives the external timestamp extractor and the engine
//!   for every iteration, conversation, and case (`runner`, `extractor`).
//! - **Aggregation**: rolls verdicts into null-aware scores, bottom-up
//!   and frozen once built (`aggregate`).
//!
//! INDETERMINATE is a first-class verdict, not an error: it propagates
//! through aggregation as a missing score, never as a zero.

pub mod aggregate;
pub mod case;
pub mod conversation;
pub mod decision;
pub mod extractor;
pub mod loader;
pub mod proposition;
pub mod runner;

pub use aggregate::{
    ConversationEvaluation, IterationOutcome, IterationRecord, PropositionReport, SuiteReport,
};
pub use case::{builtin_cases, EvalCase};
pub use conversation::{Conversation, Message};
pub use decision::{evaluate, EvaluationResult, IndeterminateReason, Verdict};
pub use extractor::{ExtractorError, ExtractorOutput, LlmTimestampExtractor, TimestampExtractor};
pub use loader::{load_case, load_cases_from_dir};
pub use proposition::{InvalidProposition, Proposition, Shape, Term};
pub use runner::Harness;
