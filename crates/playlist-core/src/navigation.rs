//! Navigation facade and display projection.
//!
//! Index positioning that bypasses the resolver (review, "back", instructor
//! override) plus the read-only [`DisplayEntry`] projection handed to a
//! rendering layer. The projection never exposes the attempt log or node
//! mastery, so the session representation can change without breaking
//! consumers.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::catalog::UnitCategory;
use crate::config::AdaptiveConfig;
use crate::error::CoreError;
use crate::gate::{GateStatus, gate_status};
use crate::session::{PlaylistEntry, Session};

/// One playlist row as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    pub id: String,
    pub title: String,
    pub category: UnitCategory,
    pub is_current: bool,
    pub is_completed: bool,
    pub is_skipped: bool,
    pub is_required: bool,
    pub is_gate: bool,
    /// Present only for gates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_status: Option<GateStatus>,
}

/// Aggregate progress for headers and progress bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub completed: usize,
    pub skipped: usize,
    pub total: usize,
    /// Share of entries completed or skipped, clamped to `[0, 100]`.
    /// Each entry counts once.
    pub percent: f64,
}

/// Move to `index` regardless of gate or completion state.
///
/// # Errors
///
/// Returns `CoreError::IndexOutOfRange` unless `index < playlist.len()`.
#[instrument(skip(session), fields(from = session.current_index()))]
pub fn go_to_index(session: &Session, index: usize) -> Result<Session, CoreError> {
    let len = session.playlist.len();
    if index >= len {
        return Err(CoreError::IndexOutOfRange { index, len });
    }
    let mut next = session.clone();
    next.current_index = index;
    debug!(to = index, "navigated");
    Ok(next)
}

/// Learner-initiated navigation.
///
/// With learner choice enabled this is [`go_to_index`]. Otherwise the learner
/// may stay, go back, or revisit a completed entry, but not jump ahead.
///
/// # Errors
///
/// Returns `CoreError::IndexOutOfRange` for an index past the playlist.
/// Returns `CoreError::NavigationLocked` for a forward jump to an entry the
/// learner has not completed while learner choice is disabled.
pub fn choose_index(
    session: &Session,
    config: &AdaptiveConfig,
    index: usize,
) -> Result<Session, CoreError> {
    if !config.allow_learner_choice()
        && index > session.current_index
        && index < session.playlist.len()
        && !session.completed.contains(&session.playlist[index].id)
    {
        return Err(CoreError::NavigationLocked { index });
    }
    go_to_index(session, index)
}

/// The entry at the current index, or `None` once complete.
pub fn current_entry(session: &Session) -> Option<&PlaylistEntry> {
    session.playlist.get(session.current_index)
}

/// `true` iff the playlist is empty or the index is past the last entry.
pub fn is_complete(session: &Session) -> bool {
    session.is_complete()
}

/// Project the session into display rows, one per playlist entry.
pub fn display_entries(session: &Session) -> Vec<DisplayEntry> {
    session
        .playlist
        .iter()
        .enumerate()
        .map(|(index, entry)| DisplayEntry {
            id: entry.id.clone(),
            title: entry.title.clone(),
            category: entry.source_unit.category,
            is_current: index == session.current_index,
            is_completed: session.completed.contains(&entry.id),
            is_skipped: session.skipped.contains(&entry.id),
            is_required: entry.is_required,
            is_gate: entry.is_gate,
            gate_status: entry.is_gate.then(|| gate_status(session, &entry.id)),
        })
        .collect()
}

/// Summarize completion for display.
pub fn progress_summary(session: &Session) -> ProgressSummary {
    let total = session.playlist.len();
    let skipped = session.skipped.len();
    // An id in both sets counts once, as skipped.
    let completed = session.completed.difference(&session.skipped).count();
    let percent = if total == 0 {
        100.0
    } else {
        ((completed + skipped) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    };
    ProgressSummary {
        completed,
        skipped,
        total,
        percent,
    }
}
