//! Adaptive playlist sequencing engine.
//!
//! Materializes a module's learning units into a playlist, decides which
//! unit a learner sees next, gates progression behind pass/fail checks and
//! projects the session into a read-only view. Every transition is a pure
//! function from one [`Session`] to the next; [`PlaylistEngine`] wraps them in
//! a state container with explicit change notification.

mod builder;
mod catalog;
mod config;
mod engine;
mod error;
mod events;
mod gate;
mod navigation;
mod progress;
mod resolver;
mod session;
mod snapshot;

pub use builder::{CategoryGatePolicy, GatePolicy, build, build_with_policy};
pub use catalog::{LearningUnit, UnitCategory, UnitKind, load_catalog};
pub use config::{AdaptiveConfig, SequencingMode, load_config};
pub use engine::PlaylistEngine;
pub use error::CoreError;
pub use events::{SessionEvent, SessionEvents};
pub use gate::{
    GateResult, GateStatus, gate_status, next_attempt_number, record_gate_result,
    remediation_nodes,
};
pub use navigation::{
    DisplayEntry, ProgressSummary, choose_index, current_entry, display_entries, go_to_index,
    is_complete, progress_summary,
};
pub use progress::{node_mastery, update_node_progress};
pub use resolver::{Decision, apply_decision, resolve_next};
pub use session::{GateAttempt, NodeProgress, PlaylistEntry, Session};
pub use snapshot::{
    SNAPSHOT_VERSION, SessionSnapshot, load_snapshot, save_snapshot, validate_session,
};
