//! Playlist builder.
//!
//! Turns a catalog and a configuration into a fresh [`Session`]: units are
//! stably sorted by `sequence`, mapped to entries and tagged as gates by a
//! [`GatePolicy`].

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::catalog::LearningUnit;
use crate::config::AdaptiveConfig;
use crate::error::CoreError;
use crate::session::{PlaylistEntry, Session};

/// Decides which playlist entries are gates.
///
/// Hosts implement this to override the default categorization.
pub trait GatePolicy {
    /// Returns `true` if the unit at `position` (in sorted order) is a gate.
    fn is_gate(&self, unit: &LearningUnit, position: usize, config: &AdaptiveConfig) -> bool;
}

/// Default policy: categories listed in [`AdaptiveConfig::gate_categories`]
/// are gates, and with pre-assessment enabled so is the first unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryGatePolicy;

impl GatePolicy for CategoryGatePolicy {
    fn is_gate(&self, unit: &LearningUnit, position: usize, config: &AdaptiveConfig) -> bool {
        config.gate_categories().contains(&unit.category)
            || (config.pre_assessment_enabled() && position == 0)
    }
}

/// Build a session with the default [`CategoryGatePolicy`].
///
/// # Errors
///
/// Returns `CoreError::MasteryOutOfRange` for an invalid threshold.
/// Returns `CoreError::DuplicateUnit` if two units share an id.
pub fn build(catalog: &[LearningUnit], config: &AdaptiveConfig) -> Result<Session, CoreError> {
    build_with_policy(catalog, config, &CategoryGatePolicy)
}

/// Build a session, tagging gates with a host-supplied policy.
///
/// # Errors
///
/// Returns `CoreError::MasteryOutOfRange` for an invalid threshold.
/// Returns `CoreError::DuplicateUnit` if two units share an id.
#[instrument(skip_all, fields(units = catalog.len(), mode = ?config.mode()))]
pub fn build_with_policy(
    catalog: &[LearningUnit],
    config: &AdaptiveConfig,
    policy: &dyn GatePolicy,
) -> Result<Session, CoreError> {
    config.validate()?;

    let mut seen = HashSet::with_capacity(catalog.len());
    for unit in catalog {
        if !seen.insert(unit.id.as_str()) {
            return Err(CoreError::DuplicateUnit(unit.id.clone()));
        }
    }

    let mut sorted: Vec<&LearningUnit> = catalog.iter().collect();
    // `sort_by_key` is stable, so equal sequences keep catalog order.
    sorted.sort_by_key(|u| u.sequence);

    let playlist: Vec<PlaylistEntry> = sorted
        .into_iter()
        .enumerate()
        .map(|(position, unit)| {
            let is_gate = policy.is_gate(unit, position, config);
            debug!(unit = %unit.id, position, is_gate, "materialized entry");
            PlaylistEntry {
                id: unit.id.clone(),
                title: unit.title.clone(),
                source_unit: unit.clone(),
                is_gate,
                is_required: unit.is_required,
            }
        })
        .collect();

    info!(entries = playlist.len(), "built playlist");

    Ok(Session {
        playlist,
        ..Session::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitCategory;
    use crate::catalog::fixtures::{graded, unit};

    fn ids(session: &Session) -> Vec<&str> {
        session.playlist().iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_should_sort_by_sequence_keeping_ties_stable() {
        let catalog = vec![unit("c", 3), unit("a", 1), unit("b1", 2), unit("b2", 2)];
        let session = build(&catalog, &AdaptiveConfig::default()).expect("should build");

        assert_eq!(ids(&session), vec!["a", "b1", "b2", "c"]);
        assert_eq!(session.current_index(), 0);
        assert!(session.completed().is_empty());
        assert!(session.skipped().is_empty());
    }

    #[test]
    fn test_should_tag_graded_units_as_gates() {
        let catalog = vec![unit("lu-1", 1), graded("lu-2", 2)];
        let session = build(&catalog, &AdaptiveConfig::default()).expect("should build");

        assert!(!session.playlist()[0].is_gate);
        assert!(session.playlist()[1].is_gate);
        assert_eq!(session.playlist()[1].source_unit.category, UnitCategory::Graded);
    }

    #[test]
    fn test_should_tag_first_unit_when_pre_assessment_enabled() {
        let catalog = vec![unit("later", 5), unit("first", 1)];
        let config = AdaptiveConfig::builder().pre_assessment_enabled(true).build();
        let session = build(&catalog, &config).expect("should build");

        assert_eq!(session.playlist()[0].id, "first");
        assert!(session.playlist()[0].is_gate);
        assert!(!session.playlist()[1].is_gate);
    }

    #[test]
    fn test_should_honor_configured_gate_categories() {
        let mut assignment = unit("hw", 2);
        assignment.category = UnitCategory::Assignment;
        let catalog = vec![graded("exam", 1), assignment];
        let config = AdaptiveConfig::builder()
            .gate_categories(vec![UnitCategory::Assignment])
            .build();

        let session = build(&catalog, &config).expect("should build");
        assert!(!session.playlist()[0].is_gate);
        assert!(session.playlist()[1].is_gate);
    }

    #[test]
    fn test_should_use_host_gate_policy() {
        struct EveryOther;
        impl GatePolicy for EveryOther {
            fn is_gate(&self, _: &LearningUnit, position: usize, _: &AdaptiveConfig) -> bool {
                position % 2 == 1
            }
        }

        let catalog = vec![graded("a", 1), unit("b", 2), unit("c", 3)];
        let session = build_with_policy(&catalog, &AdaptiveConfig::default(), &EveryOther)
            .expect("should build");

        let gates: Vec<bool> = session.playlist().iter().map(|e| e.is_gate).collect();
        assert_eq!(gates, vec![false, true, false]);
    }

    #[test]
    fn test_should_build_complete_session_from_empty_catalog() {
        let session = build(&[], &AdaptiveConfig::default()).expect("should build");
        assert!(session.playlist().is_empty());
        assert!(session.is_complete());
    }

    #[test]
    fn test_should_reject_out_of_range_threshold() {
        let config = AdaptiveConfig::builder().mastery_threshold(-1.0).build();
        let result = build(&[unit("a", 1)], &config);
        assert!(matches!(result, Err(CoreError::MasteryOutOfRange { .. })));
    }

    #[test]
    fn test_should_reject_duplicate_unit_ids() {
        let catalog = vec![unit("dup", 1), unit("dup", 2)];
        let result = build(&catalog, &AdaptiveConfig::default());
        assert!(matches!(result, Err(CoreError::DuplicateUnit(id)) if id == "dup"));
    }
}
