//! Decision engine
//!
//! Pure case analysis that turns a proposition plus the observed
//! antecedent/consequent timestamps into a PASS / FAIL / INDETERMINATE
//! verdict. Each of the six logical shapes has its own function; the
//! dispatch is an exhaustive match over [`Shape`], so there is no
//! fallthrough branch to mis-handle.
//!
//! The engine is deterministic and collaborator-free. Callers are expected
//! to have validated the proposition already; timestamp lists may arrive
//! unsorted and are sorted here.

use serde::{Deserialize, Serialize};

use crate::proposition::{Proposition, Shape};

/// Outcome of a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// The transcript does not yet contain enough evidence to judge
    Indeterminate,
}

/// Why a verdict is indeterminate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndeterminateReason {
    /// Not enough conversation has elapsed for absence to be conclusive
    ConversationTooShort,
    /// The implication is untestable: its trigger never fired
    AntecedentUnexpectedlyDidNotOccur,
    /// The premise "antecedent absent" was violated
    AntecedentUnexpectedlyOccurred,
    /// The antecedent fired past its budget, leaving no room to judge
    AntecedentOccurredTooLate,
}

/// Immutable report leaf for one decision call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    pub message: String,
    /// Present exactly when the verdict is indeterminate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<IndeterminateReason>,
}

impl EvaluationResult {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            message: message.into(),
            reason: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail,
            message: message.into(),
            reason: None,
        }
    }

    fn indeterminate(reason: IndeterminateReason, message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Indeterminate,
            message: message.into(),
            reason: Some(reason),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Timing windows in message time units, derived from the proposition's
/// response budgets (one response = two messages).
///
/// Signed arithmetic throughout: `min_conq_time` is -1 when the minimum
/// response budget is zero, and antecedent offsets can exceed the
/// conversation length when the extractor is noisy.
#[derive(Debug, Clone, Copy)]
struct Windows {
    conversation_length: i64,
    max_conq_time: i64,
    min_conq_time: i64,
    max_ant_time: i64,
}

impl Windows {
    fn new(proposition: &Proposition, conversation_length: u32) -> Self {
        let conversation_length = i64::from(conversation_length);

        let max_conq_time = if proposition.max_responses_for_consequent > 0 {
            i64::from(proposition.max_responses_for_consequent) * 2
        } else {
            conversation_length
        };

        let min_conq_time = i64::from(proposition.min_responses_for_consequent) * 2 - 1;
        let max_ant_time = i64::from(proposition.max_responses_for_antecedent) * 2;

        Self {
            conversation_length,
            max_conq_time,
            min_conq_time,
            max_ant_time,
        }
    }
}

/// Evaluate one proposition against the timestamps extracted from one
/// conversation.
///
/// `conversation_length` is the transcript length in messages. Timestamp
/// lists need not be sorted. The proposition is assumed valid (see
/// [`Proposition::validate`]); this function does not re-check it.
pub fn evaluate(
    proposition: &Proposition,
    antecedent_times: &[u32],
    consequent_times: &[u32],
    conversation_length: u32,
) -> EvaluationResult {
    let mut ant: Vec<i64> = antecedent_times.iter().map(|&t| i64::from(t)).collect();
    let mut conq: Vec<i64> = consequent_times.iter().map(|&t| i64::from(t)).collect();
    ant.sort_unstable();
    conq.sort_unstable();

    let w = Windows::new(proposition, conversation_length);

    match proposition.shape() {
        Shape::MustOccur => must_occur(&conq, &w),
        Shape::MustNotOccur => must_not_occur(&conq, &w),
        Shape::Implies => implies(&ant, &conq, &w),
        Shape::ImpliesAbsence => implies_absence(&ant, &conq, &w),
        Shape::AbsenceImplies => absence_implies(&ant, &conq, &w),
        Shape::AbsenceImpliesAbsence => absence_implies_absence(&ant, &conq, &w),
    }
}

/// Case A: "B must eventually occur"
fn must_occur(conq: &[i64], w: &Windows) -> EvaluationResult {
    match conq.first() {
        Some(&first) if first <= w.max_conq_time => EvaluationResult::pass(format!(
            "consequent observed at message {} within the {}-message window",
            first, w.max_conq_time
        )),
        Some(&first) => EvaluationResult::fail(format!(
            "earliest consequent at message {} is past the {}-message window",
            first, w.max_conq_time
        )),
        None if w.conversation_length < w.min_conq_time => EvaluationResult::indeterminate(
            IndeterminateReason::ConversationTooShort,
            format!(
                "no consequent yet and only {} of the {} messages needed have elapsed",
                w.conversation_length, w.min_conq_time
            ),
        ),
        None => EvaluationResult::fail("consequent never occurred"),
    }
}

/// Case B: "B must never occur"
fn must_not_occur(conq: &[i64], w: &Windows) -> EvaluationResult {
    match conq.first() {
        Some(&first) => EvaluationResult::fail(format!(
            "forbidden consequent occurred at message {}",
            first
        )),
        None if w.conversation_length < w.min_conq_time => EvaluationResult::indeterminate(
            IndeterminateReason::ConversationTooShort,
            format!(
                "only {} of the {} messages needed have elapsed",
                w.conversation_length, w.min_conq_time
            ),
        ),
        None => EvaluationResult::pass("consequent never occurred"),
    }
}

/// Case C: "if A then B"
fn implies(ant: &[i64], conq: &[i64], w: &Windows) -> EvaluationResult {
    let Some(&t0) = ant.first() else {
        return EvaluationResult::indeterminate(
            IndeterminateReason::AntecedentUnexpectedlyDidNotOccur,
            "antecedent never occurred, the implication is untestable",
        );
    };

    if let Some(&tc) = conq.iter().find(|&&tc| tc > t0 && tc - t0 <= w.max_conq_time) {
        return EvaluationResult::pass(format!(
            "consequent at message {} followed the antecedent at message {} within {} messages",
            tc, t0, w.max_conq_time
        ));
    }

    if w.conversation_length - t0 < w.min_conq_time {
        return indeterminate_after_antecedent(t0, w);
    }

    EvaluationResult::fail(format!(
        "antecedent occurred at message {} but no timely consequent followed",
        t0
    ))
}

/// Case D: "if A then NOT B"
fn implies_absence(ant: &[i64], conq: &[i64], w: &Windows) -> EvaluationResult {
    let Some(&t0) = ant.first() else {
        return EvaluationResult::indeterminate(
            IndeterminateReason::AntecedentUnexpectedlyDidNotOccur,
            "antecedent never occurred, the implication is untestable",
        );
    };

    if w.conversation_length - t0 < w.min_conq_time {
        return indeterminate_after_antecedent(t0, w);
    }

    // Any antecedent/consequent pair inside the forbidden window fails.
    let violation = ant.iter().copied().find_map(|ta| {
        conq.iter()
            .copied()
            .find(|&tc| tc > ta && tc - ta <= w.max_conq_time)
            .map(|tc| (ta, tc))
    });

    match violation {
        Some((ta, tc)) => EvaluationResult::fail(format!(
            "forbidden consequent at message {} followed the antecedent at message {} within {} messages",
            tc, ta, w.max_conq_time
        )),
        None => EvaluationResult::pass(
            "no consequent followed any antecedent within the forbidden window",
        ),
    }
}

/// Case E: "if NOT A then B"
fn absence_implies(ant: &[i64], conq: &[i64], w: &Windows) -> EvaluationResult {
    if let Some(&first_conq) = conq.first() {
        // An antecedent before the first consequent invalidates the
        // premise before clean evidence could be gathered. Antecedents
        // after the first consequent are deliberately not examined.
        if ant.first().is_some_and(|&ta| ta < first_conq) {
            return EvaluationResult::indeterminate(
                IndeterminateReason::ConversationTooShort,
                format!(
                    "antecedent occurred at message {} before the first consequent at message {}",
                    ant[0], first_conq
                ),
            );
        }

        return if first_conq <= w.max_conq_time {
            EvaluationResult::pass(format!(
                "consequent observed at message {} with the antecedent absent",
                first_conq
            ))
        } else {
            EvaluationResult::fail(format!(
                "earliest consequent at message {} is past the {}-message window",
                first_conq, w.max_conq_time
            ))
        };
    }

    if !ant.is_empty() {
        return EvaluationResult::indeterminate(
            IndeterminateReason::AntecedentUnexpectedlyOccurred,
            format!(
                "premise violated: antecedent occurred at message {} and no consequent was observed",
                ant[0]
            ),
        );
    }

    if w.conversation_length < w.min_conq_time {
        return EvaluationResult::indeterminate(
            IndeterminateReason::ConversationTooShort,
            format!(
                "only {} of the {} messages needed have elapsed",
                w.conversation_length, w.min_conq_time
            ),
        );
    }

    EvaluationResult::fail("antecedent stayed absent but the consequent never occurred")
}

/// Case F: "if NOT A then NOT B"
fn absence_implies_absence(ant: &[i64], conq: &[i64], w: &Windows) -> EvaluationResult {
    if let Some(&first_conq) = conq.first() {
        // Same premise-violation rule as Case E, but here the violation
        // makes the consequent's occurrence unattributable rather than
        // merely premature.
        return if ant.first().is_some_and(|&ta| ta < first_conq) {
            EvaluationResult::indeterminate(
                IndeterminateReason::AntecedentUnexpectedlyOccurred,
                format!(
                    "antecedent occurred at message {} before the forbidden consequent at message {}",
                    ant[0], first_conq
                ),
            )
        } else {
            EvaluationResult::fail(format!(
                "forbidden consequent occurred at message {} while the premise held",
                first_conq
            ))
        };
    }

    if !ant.is_empty() {
        return EvaluationResult::indeterminate(
            IndeterminateReason::AntecedentUnexpectedlyOccurred,
            format!("premise violated: antecedent occurred at message {}", ant[0]),
        );
    }

    if w.conversation_length < w.min_conq_time {
        return EvaluationResult::indeterminate(
            IndeterminateReason::ConversationTooShort,
            format!(
                "only {} of the {} messages needed have elapsed",
                w.conversation_length, w.min_conq_time
            ),
        );
    }

    EvaluationResult::pass("neither antecedent nor consequent occurred")
}

/// Shared Case C/D indeterminacy: the antecedent fired, a consequent could
/// not be confirmed, and not enough conversation remains after it.
fn indeterminate_after_antecedent(t0: i64, w: &Windows) -> EvaluationResult {
    if t0 > w.max_ant_time {
        EvaluationResult::indeterminate(
            IndeterminateReason::AntecedentOccurredTooLate,
            format!(
                "antecedent at message {} is past its {}-message budget, leaving no room to judge",
                t0, w.max_ant_time
            ),
        )
    } else {
        EvaluationResult::indeterminate(
            IndeterminateReason::ConversationTooShort,
            format!(
                "only {} of the {} messages needed remain after the antecedent at message {}",
                w.conversation_length - t0,
                w.min_conq_time,
                t0
            ),
        )
    }
}
