//! Gate subsystem.
//!
//! Records pass/fail outcomes for gated units and derives their status from
//! the latest attempt. Recording never moves the session; the caller resolves
//! and applies the next decision separately so feedback can be shown first.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::CoreError;
use crate::session::{GateAttempt, Session};

/// Outcome of one gate check, as reported by an assessment collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub lu_id: String,
    pub passed: bool,
    pub score: f64,
    pub attempt_number: u32,
    #[serde(default)]
    pub failed_nodes: Vec<String>,
}

/// Derived gate status exposed to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateStatus {
    /// No attempt recorded yet.
    Pending,
    /// Latest attempt passed.
    Passed,
    /// Latest attempt failed.
    Failed,
}

/// Append a gate attempt, returning the updated session.
///
/// # Errors
///
/// Returns `CoreError::UnknownUnit` if `lu_id` is not in the playlist.
/// Returns `CoreError::InvalidScore` if `score` is NaN or infinite.
/// Returns `CoreError::AttemptOutOfSequence` unless `attempt_number` is one
/// more than the number of attempts already recorded.
#[instrument(skip(session), fields(unit = %result.lu_id, attempt = result.attempt_number))]
pub fn record_gate_result(session: &Session, result: GateResult) -> Result<Session, CoreError> {
    if session.index_of(&result.lu_id).is_none() {
        return Err(CoreError::UnknownUnit(result.lu_id));
    }
    if !result.score.is_finite() {
        return Err(CoreError::InvalidScore {
            unit_id: result.lu_id,
            score: result.score,
        });
    }

    let expected = next_attempt_number(session, &result.lu_id);
    if result.attempt_number != expected {
        warn!(expected, got = result.attempt_number, "attempt out of sequence");
        return Err(CoreError::AttemptOutOfSequence {
            unit_id: result.lu_id,
            expected,
            got: result.attempt_number,
        });
    }

    let mut next = session.clone();
    next.gate_attempts
        .entry(result.lu_id)
        .or_default()
        .push(GateAttempt {
            passed: result.passed,
            score: result.score,
            attempt_number: result.attempt_number,
            failed_nodes: result.failed_nodes,
        });
    debug!(passed = result.passed, "recorded gate attempt");
    Ok(next)
}

/// The attempt number the next recorded result must carry.
pub fn next_attempt_number(session: &Session, unit_id: &str) -> u32 {
    u32::try_from(session.gate_attempts(unit_id).len())
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}

/// Status derived from the latest attempt only.
pub fn gate_status(session: &Session, unit_id: &str) -> GateStatus {
    match session.gate_attempts(unit_id).last() {
        None => GateStatus::Pending,
        Some(attempt) if attempt.passed => GateStatus::Passed,
        Some(_) => GateStatus::Failed,
    }
}

/// Whether the resolver may move past the unit.
pub(crate) fn is_gate_satisfied(session: &Session, unit_id: &str) -> bool {
    gate_status(session, unit_id) == GateStatus::Passed
}

/// Nodes the learner failed on the latest attempt.
///
/// Empty when the gate is pending or the latest attempt passed.
pub fn remediation_nodes<'a>(session: &'a Session, unit_id: &str) -> &'a [String] {
    match session.gate_attempts(unit_id).last() {
        Some(attempt) if !attempt.passed => &attempt.failed_nodes,
        _ => &[],
    }
}
