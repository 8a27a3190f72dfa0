//! Learning unit descriptors and catalog loading.
//!
//! A catalog is the ordered, immutable syllabus of a module: one
//! [`LearningUnit`] per addressable piece of content. The engine only reads
//! it; content fetching and rendering belong to the host.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::CoreError;

/// A single learning unit as supplied by the content service.
///
/// # Examples
///
/// ```
/// use playlist_core::{LearningUnit, UnitCategory};
///
/// let yaml = r#"
/// id: lu-1
/// title: "Intro video"
/// type: media
/// contentId: vid-001
/// category: topic
/// isRequired: true
/// sequence: 1
/// estimatedDuration: 300
/// "#;
///
/// let unit: LearningUnit = serde_yaml::from_str(yaml).expect("valid yaml");
/// assert_eq!(unit.category, UnitCategory::Topic);
/// assert!(unit.node_ids.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningUnit {
    /// Unique unit id.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Kind tag of the unit.
    #[serde(rename = "type")]
    pub kind: UnitKind,

    /// Opaque reference to the external content.
    pub content_id: String,

    /// Pedagogical category, drives default gate tagging.
    pub category: UnitCategory,

    /// Required units can never be skipped by adaptive branching.
    #[serde(default)]
    pub is_required: bool,

    /// Catalog order. Ties keep input order.
    pub sequence: i64,

    /// Estimated duration in seconds. Informational only.
    #[serde(default)]
    pub estimated_duration: u32,

    /// Concept nodes this unit teaches or assesses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_ids: Vec<String>,
}

/// Kind tag of a learning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitKind {
    /// Video, audio, document or SCORM package.
    Media,
    /// Topic page, quiz or assignment authored in the platform.
    Topic,
}

/// Pedagogical category of a learning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitCategory {
    Topic,
    Practice,
    Assignment,
    Graded,
}

/// Load a catalog from a YAML file containing a list of units.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file cannot be read.
/// Returns `CoreError::Yaml` if the content is not a valid unit list.
#[instrument]
pub fn load_catalog(path: &Path) -> Result<Vec<LearningUnit>, CoreError> {
    let content = fs::read_to_string(path)?;
    let units: Vec<LearningUnit> = serde_yaml::from_str(&content)?;
    debug!(units = units.len(), "loaded catalog");
    Ok(units)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Build a unit with sensible defaults for tests.
    pub(crate) fn unit(id: &str, sequence: i64) -> LearningUnit {
        LearningUnit {
            id: id.to_owned(),
            title: format!("Unit {id}"),
            kind: UnitKind::Topic,
            content_id: format!("content-{id}"),
            category: UnitCategory::Topic,
            is_required: true,
            sequence,
            estimated_duration: 60,
            node_ids: Vec::new(),
        }
    }

    pub(crate) fn graded(id: &str, sequence: i64) -> LearningUnit {
        LearningUnit {
            category: UnitCategory::Graded,
            ..unit(id, sequence)
        }
    }

    /// Optional unit covering the given nodes.
    pub(crate) fn optional(id: &str, sequence: i64, nodes: &[&str]) -> LearningUnit {
        LearningUnit {
            is_required: false,
            node_ids: nodes.iter().map(|n| (*n).to_owned()).collect(),
            ..unit(id, sequence)
        }
    }
}
