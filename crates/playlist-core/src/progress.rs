//! Per-node mastery tracking.
//!
//! The engine stores mastery but does not compute it; an assessment-scoring
//! collaborator owns the formula and overwrites the stored value.

use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::session::{NodeProgress, Session};

/// Overwrite the stored progress for `node_id`.
///
/// # Errors
///
/// Returns `CoreError::MasteryOutOfRange` if `progress.mastery` is NaN or
/// outside `[0, 1]`.
#[instrument(skip(session))]
pub fn update_node_progress(
    session: &Session,
    node_id: &str,
    progress: NodeProgress,
) -> Result<Session, CoreError> {
    if !(0.0..=1.0).contains(&progress.mastery) {
        return Err(CoreError::MasteryOutOfRange {
            node_id: node_id.to_owned(),
            mastery: progress.mastery,
        });
    }

    let mut next = session.clone();
    next.node_progress.insert(node_id.to_owned(), progress);
    debug!("stored node progress");
    Ok(next)
}

/// Mastery for a node, `0.0` when never recorded.
pub fn node_mastery(session: &Session, node_id: &str) -> f64 {
    session
        .node_progress(node_id)
        .map_or(0.0, |progress| progress.mastery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(mastery: f64, attempts: u32) -> NodeProgress {
        NodeProgress { mastery, attempts }
    }

    #[test]
    fn test_should_overwrite_existing_progress() {
        let s1 = update_node_progress(&Session::default(), "fractions", progress(0.4, 1))
            .expect("should update");
        let s2 = update_node_progress(&s1, "fractions", progress(0.9, 3)).expect("should update");

        assert_eq!(s2.node_progress("fractions"), Some(&progress(0.9, 3)));
        assert_eq!(s1.node_progress("fractions"), Some(&progress(0.4, 1)));
    }

    #[test]
    fn test_should_be_idempotent_for_identical_input() {
        let once = update_node_progress(&Session::default(), "n", progress(0.5, 2))
            .expect("should update");
        let twice = update_node_progress(&once, "n", progress(0.5, 2)).expect("should update");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_should_accept_interval_bounds() {
        let s = update_node_progress(&Session::default(), "lo", progress(0.0, 0))
            .expect("should accept 0");
        let s = update_node_progress(&s, "hi", progress(1.0, 1)).expect("should accept 1");
        assert!((node_mastery(&s, "hi") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_should_reject_out_of_range_mastery() {
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let result = update_node_progress(&Session::default(), "n", progress(bad, 1));
            assert!(
                matches!(result, Err(CoreError::MasteryOutOfRange { .. })),
                "mastery {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_should_default_untouched_node_mastery_to_zero() {
        assert_eq!(node_mastery(&Session::default(), "unknown"), 0.0);
    }
}
