//! Decision resolver and decision application.
//!
//! [`resolve_next`] is pure: it looks at the session and configuration and
//! reports what should happen next. [`apply_decision`] performs the state
//! transition and enforces the gate invariants, so a decision computed against
//! stale state cannot silently move a learner past an unpassed gate.
//!
//! # Edge cases
//!
//! - **Complete session**: resolves to [`Decision::Complete`].
//! - **Off mode**: linear traversal, but gates still block with
//!   [`Decision::RetryGate`].
//! - **Adaptive mode, everything left mastered**: the branch target equals the
//!   playlist length, so applying it completes the session.
//! - **Unit without nodes**: never a skip candidate, mastery cannot be judged.
//! - **Mastery equal to the threshold**: not mastered. A node must exceed the
//!   threshold, so an unassessed node (mastery `0.0`) never qualifies.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::AdaptiveConfig;
use crate::error::CoreError;
use crate::gate::is_gate_satisfied;
use crate::progress::node_mastery;
use crate::session::{PlaylistEntry, Session};

/// Next action for the player shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Decision {
    /// Move to the next non-skipped entry.
    Advance,

    /// Skip forward past mastered, non-required entries in one step.
    Branch {
        /// Index to land on. Equal to the playlist length when nothing is left.
        target_index: usize,
        /// Entry ids that will be marked skipped.
        skipped: Vec<String>,
    },

    /// The current gate has no passing latest attempt.
    RetryGate {
        /// Attempts recorded so far for the gate.
        attempts: u32,
    },

    /// No entry left after the current one.
    Complete,
}

/// Compute the next decision without touching the session.
#[instrument(skip_all, fields(index = session.current_index(), mode = ?config.mode()))]
pub fn resolve_next(session: &Session, config: &AdaptiveConfig) -> Decision {
    if session.is_complete() {
        return Decision::Complete;
    }

    let index = session.current_index;
    let current = &session.playlist[index];
    if current.is_gate && !is_gate_satisfied(session, &current.id) {
        let attempts = u32::try_from(session.gate_attempts(&current.id).len()).unwrap_or(u32::MAX);
        debug!(gate = %current.id, attempts, "gate not passed");
        return Decision::RetryGate { attempts };
    }

    let Some(next) = session.next_active_index(index) else {
        return Decision::Complete;
    };

    if !config.mode().is_adaptive() {
        return Decision::Advance;
    }

    let mut skipped = Vec::new();
    let mut cursor = Some(next);
    while let Some(i) = cursor {
        let entry = &session.playlist[i];
        if !is_skip_candidate(session, config, entry) {
            break;
        }
        skipped.push(entry.id.clone());
        cursor = session.next_active_index(i);
    }

    if skipped.is_empty() {
        Decision::Advance
    } else {
        let target_index = cursor.unwrap_or(session.playlist.len());
        debug!(target_index, skipped = skipped.len(), "branching past mastered entries");
        Decision::Branch {
            target_index,
            skipped,
        }
    }
}

/// An entry may be branched over when it is optional, not a gate, not yet
/// completed, and every node it covers is strictly above the threshold.
fn is_skip_candidate(session: &Session, config: &AdaptiveConfig, entry: &PlaylistEntry) -> bool {
    let nodes = &entry.source_unit.node_ids;
    !entry.is_required
        && !entry.is_gate
        && !session.completed.contains(&entry.id)
        && !nodes.is_empty()
        && nodes
            .iter()
            .all(|node| node_mastery(session, node) > config.mastery_threshold())
}

/// Apply a decision, returning the new session.
///
/// The entry being left is marked completed. A branch also marks every
/// non-skipped entry it passes as skipped.
///
/// # Errors
///
/// Returns `CoreError::SessionComplete` for any decision other than
/// `Complete` on a complete session.
/// Returns `CoreError::GateNotPassed` when leaving a gate whose latest
/// attempt did not pass.
/// Returns `CoreError::InvalidTransition` for a stale or malformed decision:
/// a branch that moves backwards, past a required entry or gate, or with a
/// skip list that does not match, `Complete` while entries remain, or
/// `RetryGate` when the current entry is not an unpassed gate.
#[instrument(skip(session), fields(index = session.current_index()))]
pub fn apply_decision(session: &Session, decision: &Decision) -> Result<Session, CoreError> {
    if session.is_complete() {
        return match decision {
            Decision::Complete => Ok(session.clone()),
            _ => Err(CoreError::SessionComplete),
        };
    }

    let index = session.current_index;
    let len = session.playlist.len();

    match decision {
        Decision::RetryGate { .. } => {
            let current = &session.playlist[index];
            if !current.is_gate || is_gate_satisfied(session, &current.id) {
                return Err(CoreError::InvalidTransition(format!(
                    "{} is not an unpassed gate",
                    current.id
                )));
            }
            Ok(session.clone())
        }

        Decision::Advance => {
            ensure_gate_passed(session)?;
            let target = session.next_active_index(index).unwrap_or(len);
            Ok(leave_current(session, target, &[]))
        }

        Decision::Branch {
            target_index,
            skipped,
        } => {
            ensure_gate_passed(session)?;
            let target = *target_index;
            if target <= index || target > len {
                return Err(CoreError::InvalidTransition(format!(
                    "branch target {target} is not ahead of index {index}"
                )));
            }

            let passed: Vec<&PlaylistEntry> = session.playlist[index + 1..target]
                .iter()
                .filter(|e| !session.skipped.contains(&e.id))
                .collect();
            if let Some(blocked) = passed.iter().find(|e| e.is_required || e.is_gate) {
                warn!(entry = %blocked.id, "branch would skip a required entry or gate");
                return Err(CoreError::InvalidTransition(format!(
                    "branch would skip {} which cannot be skipped",
                    blocked.id
                )));
            }
            let passed_ids: Vec<String> = passed.iter().map(|e| e.id.clone()).collect();
            if passed_ids.is_empty() || &passed_ids != skipped {
                return Err(CoreError::InvalidTransition(
                    "branch skip list does not match the session".to_owned(),
                ));
            }

            Ok(leave_current(session, target, &passed_ids))
        }

        Decision::Complete => {
            ensure_gate_passed(session)?;
            if let Some(next) = session.next_active_index(index) {
                return Err(CoreError::InvalidTransition(format!(
                    "cannot complete while {} is still ahead",
                    session.playlist[next].id
                )));
            }
            Ok(leave_current(session, len, &[]))
        }
    }
}

/// Reject leaving the current entry if it is an unpassed gate.
fn ensure_gate_passed(session: &Session) -> Result<(), CoreError> {
    let current = &session.playlist[session.current_index];
    if current.is_gate && !is_gate_satisfied(session, &current.id) {
        warn!(gate = %current.id, "refusing to move past unpassed gate");
        return Err(CoreError::GateNotPassed {
            unit_id: current.id.clone(),
        });
    }
    Ok(())
}

fn leave_current(session: &Session, target: usize, skipped: &[String]) -> Session {
    let mut next = session.clone();
    let from = session.current_index;
    let left = &session.playlist[from].id;
    // A skipped entry revisited during review keeps its skipped disposition.
    if !session.skipped.contains(left) {
        next.completed.insert(left.clone());
    }
    next.skipped.extend(skipped.iter().cloned());
    next.current_index = target;
    debug!(from, to = target, skipped = skipped.len(), "moved");
    next
}
