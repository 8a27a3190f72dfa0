//! Session state owned by the engine.
//!
//! A [`Session`] is the single source of truth for one learner inside one
//! module: the materialized playlist, the current position, completion and
//! skip flags, the gate attempt log and per-node mastery. Hosts may serialize
//! and restore it; mutation goes through the functions in this crate, which
//! return a new value and leave the caller's snapshot untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::LearningUnit;

/// Materialized, per-learner playlist state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Ordered playlist entries.
    pub(crate) playlist: Vec<PlaylistEntry>,

    /// Position in `playlist`. Equal to `playlist.len()` once complete.
    pub(crate) current_index: usize,

    /// Ids of entries the learner has finished.
    #[serde(default)]
    pub(crate) completed: BTreeSet<String>,

    /// Ids of non-required entries bypassed by branching.
    #[serde(default)]
    pub(crate) skipped: BTreeSet<String>,

    /// Append-only gate attempt log keyed by unit id.
    #[serde(default)]
    pub(crate) gate_attempts: BTreeMap<String, Vec<GateAttempt>>,

    /// Mastery per concept node.
    #[serde(default)]
    pub(crate) node_progress: BTreeMap<String, NodeProgress>,
}

impl Session {
    /// Returns the ordered playlist.
    pub fn playlist(&self) -> &[PlaylistEntry] {
        &self.playlist
    }

    /// Returns the current position.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Returns the ids of completed entries.
    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    /// Returns the ids of skipped entries.
    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    /// Returns the recorded attempts for a unit, oldest first.
    pub fn gate_attempts(&self, unit_id: &str) -> &[GateAttempt] {
        self.gate_attempts
            .get(unit_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns stored progress for a node, if any.
    pub fn node_progress(&self, node_id: &str) -> Option<&NodeProgress> {
        self.node_progress.get(node_id)
    }

    /// Returns `true` when there is no entry left to show.
    pub fn is_complete(&self) -> bool {
        self.playlist.is_empty() || self.current_index >= self.playlist.len()
    }

    /// Position of the entry with the given id.
    pub(crate) fn index_of(&self, unit_id: &str) -> Option<usize> {
        self.playlist.iter().position(|e| e.id == unit_id)
    }

    /// First index after `from` whose entry has not been skipped.
    pub(crate) fn next_active_index(&self, from: usize) -> Option<usize> {
        (from + 1..self.playlist.len()).find(|&i| !self.skipped.contains(&self.playlist[i].id))
    }
}

/// One learning unit materialized into a session playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    /// Same as the source unit id.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Read-only copy of the catalog unit.
    pub source_unit: LearningUnit,

    /// Whether a pass/fail check must succeed before moving past this entry.
    pub is_gate: bool,

    /// Required entries are never skipped.
    pub is_required: bool,
}

/// A recorded pass/fail check for a gated unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateAttempt {
    pub passed: bool,
    pub score: f64,
    /// 1-based, increasing per unit.
    pub attempt_number: u32,
    /// Nodes the learner did not demonstrate mastery on.
    #[serde(default)]
    pub failed_nodes: Vec<String>,
}

/// Stored mastery for one concept node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProgress {
    /// Proficiency in `[0, 1]`.
    pub mastery: f64,
    pub attempts: u32,
}
