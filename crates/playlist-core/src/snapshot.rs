//! Session snapshot persistence.
//!
//! A host persists the whole session, together with the configuration it was
//! built with, between player mounts. Writes go to a temporary file in the
//! target directory and are renamed into place, so a reader never sees a
//! partially written snapshot.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::AdaptiveConfig;
use crate::error::CoreError;
use crate::session::Session;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of a learner session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Format version, see [`SNAPSHOT_VERSION`].
    pub version: u32,

    /// Configuration the session runs under.
    #[serde(default)]
    pub config: AdaptiveConfig,

    /// The session itself.
    pub session: Session,
}

impl SessionSnapshot {
    /// Wrap a session at the current format version.
    pub fn new(config: AdaptiveConfig, session: Session) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            config,
            session,
        }
    }
}

/// Write a snapshot as YAML, replacing any existing file atomically.
///
/// # Errors
///
/// Returns `CoreError::Io` if the temporary file cannot be created, written
/// or renamed.
/// Returns `CoreError::Yaml` if the snapshot cannot be serialized.
#[instrument(skip(snapshot))]
pub fn save_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let yaml = serde_yaml::to_string(snapshot)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CoreError::Io(e.error))?;
    debug!(path = %path.display(), "saved session snapshot");
    Ok(())
}

/// Read and validate a snapshot.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file cannot be read.
/// Returns `CoreError::Yaml` if the content cannot be parsed.
/// Returns `CoreError::InvalidSnapshot` if the version is unsupported or the
/// session breaks an invariant.
/// Returns `CoreError::MasteryOutOfRange` if the stored threshold is invalid.
#[instrument]
pub fn load_snapshot(path: &Path) -> Result<SessionSnapshot, CoreError> {
    let content = fs::read_to_string(path)?;
    let snapshot: SessionSnapshot = serde_yaml::from_str(&content)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CoreError::InvalidSnapshot(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    snapshot.config.validate()?;
    validate_session(&snapshot.session)?;
    Ok(snapshot)
}

/// Check a rehydrated session against the invariants the engine relies on.
///
/// # Errors
///
/// Returns `CoreError::InvalidSnapshot` describing the first violation found.
pub fn validate_session(session: &Session) -> Result<(), CoreError> {
    let invalid = |msg: String| Err(CoreError::InvalidSnapshot(msg));

    let len = session.playlist.len();
    if session.current_index > len {
        return invalid(format!("current index {} exceeds {len}", session.current_index));
    }

    let mut ids = HashSet::with_capacity(len);
    for entry in &session.playlist {
        if entry.id != entry.source_unit.id {
            return invalid(format!("entry {} does not match its source unit", entry.id));
        }
        if !ids.insert(entry.id.as_str()) {
            return invalid(format!("duplicate entry {}", entry.id));
        }
    }

    if let Some(id) = session.completed.iter().find(|id| !ids.contains(id.as_str())) {
        return invalid(format!("completed entry {id} is not in the playlist"));
    }

    for id in &session.skipped {
        match session.playlist.iter().find(|e| &e.id == id) {
            None => return invalid(format!("skipped entry {id} is not in the playlist")),
            Some(entry) if entry.is_required => {
                return invalid(format!("required entry {id} is marked skipped"));
            }
            Some(_) => {}
        }
    }

    for (unit_id, attempts) in &session.gate_attempts {
        if !ids.contains(unit_id.as_str()) {
            return invalid(format!("gate attempts for unknown unit {unit_id}"));
        }
        for (position, attempt) in attempts.iter().enumerate() {
            if usize::try_from(attempt.attempt_number).ok() != Some(position + 1) {
                return invalid(format!(
                    "attempt {} for {unit_id} is out of sequence",
                    attempt.attempt_number
                ));
            }
            if !attempt.score.is_finite() {
                return invalid(format!("non-finite score for {unit_id}"));
            }
        }
    }

    for (node_id, progress) in &session.node_progress {
        if !(0.0..=1.0).contains(&progress.mastery) {
            return invalid(format!(
                "mastery {} for node {node_id} is outside [0, 1]",
                progress.mastery
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::catalog::fixtures::{graded, optional, unit};
    use crate::gate::{GateResult, record_gate_result};
    use crate::session::{GateAttempt, NodeProgress};

    fn session() -> Session {
        build(
            &[unit("a", 1), optional("b", 2, &["n1"]), graded("c", 3)],
            &AdaptiveConfig::default(),
        )
        .expect("should build")
    }

    #[test]
    fn test_should_save_and_load_snapshot() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("nested").join("session.yaml");

        let session = record_gate_result(
            &session(),
            GateResult {
                lu_id: "c".to_owned(),
                passed: false,
                score: 0.25,
                attempt_number: 1,
                failed_nodes: vec!["n1".to_owned()],
            },
        )
        .expect("should record");
        let snapshot = SessionSnapshot::new(AdaptiveConfig::default(), session);

        save_snapshot(&path, &snapshot).expect("should save");
        let loaded = load_snapshot(&path).expect("should load");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_should_overwrite_existing_snapshot() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("session.yaml");

        save_snapshot(&path, &SessionSnapshot::new(AdaptiveConfig::default(), session()))
            .expect("should save");
        let empty = SessionSnapshot::new(AdaptiveConfig::default(), Session::default());
        save_snapshot(&path, &empty).expect("should overwrite");

        let loaded = load_snapshot(&path).expect("should load");
        assert!(loaded.session.playlist().is_empty());
        // Only the snapshot remains; no temp files left behind.
        let files = fs::read_dir(dir.path()).expect("should list").count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_should_reject_unsupported_version() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("session.yaml");
        let mut snapshot = SessionSnapshot::new(AdaptiveConfig::default(), session());
        snapshot.version = 99;
        save_snapshot(&path, &snapshot).expect("should save");

        let result = load_snapshot(&path);
        assert!(matches!(result, Err(CoreError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_should_reject_snapshot_with_invalid_threshold() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("session.yaml");
        let config = AdaptiveConfig::builder().mastery_threshold(-1.0).build();
        save_snapshot(&path, &SessionSnapshot::new(config, session())).expect("should save");

        let result = load_snapshot(&path);
        assert!(matches!(result, Err(CoreError::MasteryOutOfRange { .. })));
    }

    #[test]
    fn test_should_accept_fresh_session() {
        assert!(validate_session(&session()).is_ok());
        assert!(validate_session(&Session::default()).is_ok());
    }

    #[test]
    fn test_should_reject_index_past_end() {
        let mut bad = session();
        bad.current_index = 4;
        assert!(matches!(
            validate_session(&bad),
            Err(CoreError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_should_reject_skipped_required_entry() {
        let mut bad = session();
        bad.skipped.insert("a".to_owned());
        assert!(matches!(
            validate_session(&bad),
            Err(CoreError::InvalidSnapshot(msg)) if msg.contains("required")
        ));
    }

    #[test]
    fn test_should_reject_attempt_gap() {
        let mut bad = session();
        bad.gate_attempts.insert(
            "c".to_owned(),
            vec![GateAttempt {
                passed: true,
                score: 1.0,
                attempt_number: 2,
                failed_nodes: vec![],
            }],
        );
        assert!(matches!(
            validate_session(&bad),
            Err(CoreError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_should_reject_mastery_out_of_range() {
        let mut bad = session();
        bad.node_progress.insert(
            "n1".to_owned(),
            NodeProgress {
                mastery: 1.5,
                attempts: 1,
            },
        );
        assert!(matches!(
            validate_session(&bad),
            Err(CoreError::InvalidSnapshot(_))
        ));
    }
}
