//! Playlist engine.
//!
//! The [`PlaylistEngine`] is the state container a player shell binds to. It
//! owns the current [`Session`] and the [`AdaptiveConfig`], delegates every
//! transition to the pure functions of this crate, swaps in the returned
//! session, and then notifies subscribers. There is no implicit reactivity:
//! each mutating call is one explicit apply-and-notify step.

use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::builder::{CategoryGatePolicy, GatePolicy, build_with_policy};
use crate::catalog::LearningUnit;
use crate::config::AdaptiveConfig;
use crate::error::CoreError;
use crate::events::{SessionEvent, SessionEvents};
use crate::gate::{GateResult, gate_status, record_gate_result};
use crate::navigation::{
    DisplayEntry, ProgressSummary, choose_index, current_entry, display_entries, go_to_index,
    progress_summary,
};
use crate::progress::update_node_progress;
use crate::resolver::{Decision, apply_decision, resolve_next};
use crate::session::{NodeProgress, PlaylistEntry, Session};
use crate::snapshot::{SessionSnapshot, validate_session};

/// Stateful sequencing engine for one learner in one module.
///
/// # Examples
///
/// ```
/// use playlist_core::{AdaptiveConfig, Decision, LearningUnit, PlaylistEngine};
///
/// # fn example(catalog: Vec<LearningUnit>) -> Result<(), playlist_core::CoreError> {
/// let mut engine = PlaylistEngine::new(&catalog, AdaptiveConfig::default())?;
/// let mut events = engine.subscribe();
///
/// while !engine.is_complete() {
///     if let Decision::RetryGate { .. } = engine.step()? {
///         break; // show the quiz again
///     }
/// }
/// let _changes = events.drain();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PlaylistEngine {
    /// Sequencing configuration.
    config: AdaptiveConfig,
    /// Current session snapshot.
    session: Session,
    /// Open subscriber channels.
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl PlaylistEngine {
    /// Build a fresh session from a catalog with the default gate policy.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MasteryOutOfRange` for an invalid threshold.
    /// Returns `CoreError::DuplicateUnit` if two units share an id.
    pub fn new(catalog: &[LearningUnit], config: AdaptiveConfig) -> Result<Self, CoreError> {
        Self::with_policy(catalog, config, &CategoryGatePolicy)
    }

    /// Build a fresh session, tagging gates with a host policy.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MasteryOutOfRange` for an invalid threshold.
    /// Returns `CoreError::DuplicateUnit` if two units share an id.
    pub fn with_policy(
        catalog: &[LearningUnit],
        config: AdaptiveConfig,
        policy: &dyn GatePolicy,
    ) -> Result<Self, CoreError> {
        let session = build_with_policy(catalog, &config, policy)?;
        Ok(Self::from_parts(config, session))
    }

    /// Rehydrate an engine from a persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MasteryOutOfRange` if the stored threshold is invalid.
    /// Returns `CoreError::InvalidSnapshot` if the session breaks an invariant.
    #[instrument(skip_all, fields(entries = snapshot.session.playlist().len()))]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, CoreError> {
        snapshot.config.validate()?;
        validate_session(&snapshot.session)?;
        info!(index = snapshot.session.current_index(), "restored session");
        Ok(Self::from_parts(snapshot.config, snapshot.session))
    }

    fn from_parts(config: AdaptiveConfig, session: Session) -> Self {
        Self {
            config,
            session,
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber for change events.
    pub fn subscribe(&mut self) -> SessionEvents {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.subscribers.push(event_tx);
        SessionEvents::new(event_rx)
    }

    // ── Queries ──────────────────────────────────────────────

    /// Returns the configuration.
    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    /// Returns the current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Snapshot the session for persistence.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(self.config.clone(), self.session.clone())
    }

    /// The entry the learner is on, or `None` once complete.
    pub fn current_entry(&self) -> Option<&PlaylistEntry> {
        current_entry(&self.session)
    }

    /// Whether there is nothing left to show.
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    /// Read-only projection for a rendering layer.
    pub fn display_entries(&self) -> Vec<DisplayEntry> {
        display_entries(&self.session)
    }

    /// Completion summary for display.
    pub fn progress(&self) -> ProgressSummary {
        progress_summary(&self.session)
    }

    /// The next decision, without applying it.
    pub fn resolve_next(&self) -> Decision {
        resolve_next(&self.session, &self.config)
    }

    // ── Mutations ────────────────────────────────────────────

    /// Apply a decision and notify subscribers.
    ///
    /// # Errors
    ///
    /// See [`apply_decision`](crate::apply_decision). On error the session is
    /// left unchanged.
    #[instrument(skip(self))]
    pub fn apply(&mut self, decision: &Decision) -> Result<(), CoreError> {
        let from = self.session.current_index();
        let was_complete = self.session.is_complete();
        self.session = apply_decision(&self.session, decision)?;
        let to = self.session.current_index();

        match decision {
            Decision::RetryGate { .. } => {}
            Decision::Advance => self.notify(SessionEvent::Advanced { from, to }),
            Decision::Branch { skipped, .. } => self.notify(SessionEvent::Branched {
                from,
                to,
                skipped: skipped.clone(),
            }),
            Decision::Complete => {}
        }

        if !was_complete && self.session.is_complete() {
            info!("playlist complete");
            self.notify(SessionEvent::Completed);
        }
        Ok(())
    }

    /// Resolve the next decision, apply it and return it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`apply`](Self::apply).
    pub fn step(&mut self) -> Result<Decision, CoreError> {
        let decision = self.resolve_next();
        self.apply(&decision)?;
        Ok(decision)
    }

    /// Record a gate result and notify subscribers. Does not advance.
    ///
    /// # Errors
    ///
    /// See [`record_gate_result`](crate::record_gate_result).
    pub fn record_gate_result(&mut self, result: GateResult) -> Result<(), CoreError> {
        let unit_id = result.lu_id.clone();
        let attempt_number = result.attempt_number;
        self.session = record_gate_result(&self.session, result)?;
        let status = gate_status(&self.session, &unit_id);
        self.notify(SessionEvent::GateRecorded {
            unit_id,
            attempt_number,
            status,
        });
        Ok(())
    }

    /// Overwrite node mastery and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MasteryOutOfRange` for mastery outside `[0, 1]`.
    pub fn update_node_progress(
        &mut self,
        node_id: &str,
        progress: NodeProgress,
    ) -> Result<(), CoreError> {
        self.session = update_node_progress(&self.session, node_id, progress)?;
        self.notify(SessionEvent::NodeUpdated {
            node_id: node_id.to_owned(),
            mastery: progress.mastery,
        });
        Ok(())
    }

    /// Jump to an index, bypassing the resolver and gates.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::IndexOutOfRange` for an invalid index.
    pub fn go_to_index(&mut self, index: usize) -> Result<(), CoreError> {
        let from = self.session.current_index();
        self.session = go_to_index(&self.session, index)?;
        self.notify(SessionEvent::Navigated { from, to: index });
        Ok(())
    }

    /// Learner-initiated jump, honoring `allowLearnerChoice`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NavigationLocked` or `CoreError::IndexOutOfRange`.
    pub fn choose(&mut self, index: usize) -> Result<(), CoreError> {
        let from = self.session.current_index();
        self.session = choose_index(&self.session, &self.config, index)?;
        self.notify(SessionEvent::Navigated { from, to: index });
        Ok(())
    }

    /// Send an event to every live subscriber, dropping closed ones.
    fn notify(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{graded, optional, unit};
    use crate::config::SequencingMode;
    use crate::gate::GateStatus;

    fn pass(engine: &mut PlaylistEngine, unit_id: &str, attempt_number: u32) {
        engine
            .record_gate_result(GateResult {
                lu_id: unit_id.to_owned(),
                passed: true,
                score: 0.95,
                attempt_number,
                failed_nodes: vec![],
            })
            .expect("should record");
    }

    #[test]
    fn test_should_walk_linear_playlist_and_notify() {
        let mut engine = PlaylistEngine::new(&[unit("a", 1), unit("b", 2)], AdaptiveConfig::default())
            .expect("should create engine");
        let mut events = engine.subscribe();

        assert_eq!(engine.step().expect("should step"), Decision::Advance);
        assert_eq!(engine.step().expect("should step"), Decision::Complete);
        assert!(engine.is_complete());
        assert!(engine.current_entry().is_none());

        assert_eq!(
            events.drain(),
            vec![SessionEvent::Advanced { from: 0, to: 1 }, SessionEvent::Completed]
        );
    }

    #[test]
    fn test_should_block_on_gate_until_passed() {
        let mut engine = PlaylistEngine::new(
            &[unit("intro", 1), graded("quiz", 2), unit("outro", 3)],
            AdaptiveConfig::default(),
        )
        .expect("should create engine");
        let mut events = engine.subscribe();

        engine.step().expect("should advance to quiz");
        assert_eq!(
            engine.step().expect("should resolve"),
            Decision::RetryGate { attempts: 0 }
        );
        assert_eq!(engine.current_entry().map(|e| e.id.as_str()), Some("quiz"));

        let err = engine.apply(&Decision::Advance).expect_err("should refuse");
        assert!(err.is_invariant_violation());
        assert_eq!(engine.session().current_index(), 1);

        pass(&mut engine, "quiz", 1);
        // Recording alone never moves the learner.
        assert_eq!(engine.session().current_index(), 1);
        assert_eq!(engine.step().expect("should step"), Decision::Advance);
        assert_eq!(engine.current_entry().map(|e| e.id.as_str()), Some("outro"));

        let recorded = events
            .drain()
            .into_iter()
            .find(|e| matches!(e, SessionEvent::GateRecorded { .. }));
        assert_eq!(
            recorded,
            Some(SessionEvent::GateRecorded {
                unit_id: "quiz".to_owned(),
                attempt_number: 1,
                status: GateStatus::Passed,
            })
        );
    }

    #[test]
    fn test_should_branch_and_report_skipped_entries() {
        let config = AdaptiveConfig::builder()
            .mode(SequencingMode::Adaptive)
            .build();
        let mut engine = PlaylistEngine::new(
            &[unit("a", 1), optional("b", 2, &["n1"]), unit("c", 3)],
            config,
        )
        .expect("should create engine");
        let mut events = engine.subscribe();

        engine
            .update_node_progress(
                "n1",
                NodeProgress {
                    mastery: 0.9,
                    attempts: 3,
                },
            )
            .expect("should update");
        engine.step().expect("should branch");

        let drained = events.drain();
        assert_eq!(
            drained,
            vec![
                SessionEvent::NodeUpdated {
                    node_id: "n1".to_owned(),
                    mastery: 0.9,
                },
                SessionEvent::Branched {
                    from: 0,
                    to: 2,
                    skipped: vec!["b".to_owned()],
                },
            ]
        );
        assert!(engine.display_entries()[1].is_skipped);
    }

    #[test]
    fn test_should_navigate_and_restore_from_snapshot() {
        let mut engine = PlaylistEngine::new(
            &[unit("a", 1), unit("b", 2), unit("c", 3)],
            AdaptiveConfig::default(),
        )
        .expect("should create engine");
        engine.go_to_index(2).expect("should navigate");
        assert!(matches!(
            engine.go_to_index(3),
            Err(CoreError::IndexOutOfRange { .. })
        ));

        let restored = PlaylistEngine::from_snapshot(engine.snapshot()).expect("should restore");
        assert_eq!(restored.session(), engine.session());
        assert_eq!(restored.current_entry().map(|e| e.id.as_str()), Some("c"));
    }

    #[test]
    fn test_should_refuse_snapshot_with_invalid_threshold() {
        let engine = PlaylistEngine::new(
            &[unit("a", 1), optional("b", 2, &["x"]), unit("c", 3)],
            AdaptiveConfig::default(),
        )
        .expect("should create engine");
        let config = AdaptiveConfig::builder()
            .mode(SequencingMode::Adaptive)
            .mastery_threshold(-1.0)
            .build();
        let snapshot = SessionSnapshot::new(config, engine.session().clone());

        let result = PlaylistEngine::from_snapshot(snapshot);
        assert!(matches!(result, Err(CoreError::MasteryOutOfRange { .. })));
    }

    #[test]
    fn test_should_refuse_forward_choice_when_locked() {
        let mut engine = PlaylistEngine::new(&[unit("a", 1), unit("b", 2)], AdaptiveConfig::default())
            .expect("should create engine");
        let mut events = engine.subscribe();

        assert!(matches!(
            engine.choose(1),
            Err(CoreError::NavigationLocked { index: 1 })
        ));
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_should_drop_closed_subscribers() {
        let mut engine = PlaylistEngine::new(&[unit("a", 1), unit("b", 2)], AdaptiveConfig::default())
            .expect("should create engine");
        let dropped = engine.subscribe();
        drop(dropped);
        let mut live = engine.subscribe();

        engine.go_to_index(1).expect("should navigate");
        assert_eq!(engine.subscribers.len(), 1);
        assert_eq!(live.drain(), vec![SessionEvent::Navigated { from: 0, to: 1 }]);
    }

    #[test]
    fn test_should_leave_session_unchanged_on_error() {
        let mut engine = PlaylistEngine::new(&[graded("quiz", 1)], AdaptiveConfig::default())
            .expect("should create engine");
        let before = engine.session().clone();

        let err = engine
            .record_gate_result(GateResult {
                lu_id: "quiz".to_owned(),
                passed: true,
                score: 1.0,
                attempt_number: 3,
                failed_nodes: vec![],
            })
            .expect_err("should reject");
        assert!(matches!(err, CoreError::AttemptOutOfSequence { .. }));
        assert_eq!(engine.session(), &before);
    }
}
