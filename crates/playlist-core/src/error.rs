use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller / contract errors ─────────────────────────────
    #[error("index {index} is out of range for a playlist of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("attempt {got} for unit {unit_id} is out of sequence, expected attempt {expected}")]
    AttemptOutOfSequence {
        unit_id: String,
        expected: u32,
        got: u32,
    },

    #[error("mastery {mastery} for node {node_id} is outside [0, 1]")]
    MasteryOutOfRange { node_id: String, mastery: f64 },

    #[error("unit not found in playlist: {0}")]
    UnknownUnit(String),

    #[error("score {score} for unit {unit_id} is not a finite number")]
    InvalidScore { unit_id: String, score: f64 },

    #[error("duplicate unit id in catalog: {0}")]
    DuplicateUnit(String),

    #[error("learner choice is disabled, cannot jump forward to index {index}")]
    NavigationLocked { index: usize },

    // ── Invariant violations ─────────────────────────────────
    #[error("cannot move past gate {unit_id}: latest attempt has not passed")]
    GateNotPassed { unit_id: String },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("session is already complete")]
    SessionComplete,

    // ── Snapshot / io ────────────────────────────────────────
    #[error("invalid session snapshot: {0}")]
    InvalidSnapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Returns `true` for errors raised when a decision would break a
    /// sequencing invariant, as opposed to a malformed caller argument.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::GateNotPassed { .. } | Self::InvalidTransition(_) | Self::SessionComplete
        )
    }
}
