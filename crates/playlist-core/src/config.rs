//! Adaptive configuration for a module playlist.
//!
//! [`AdaptiveConfig`] comes from course settings. It selects the sequencing
//! mode, whether learners may navigate freely, whether a diagnostic gate
//! precedes the first unit, and the tunables the adaptive resolver uses
//! (mastery threshold and which categories are gates).

use std::path::Path;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::catalog::UnitCategory;
use crate::error::CoreError;

/// Sequencing configuration for one module.
///
/// All fields have serde defaults, so an empty document yields a linear,
/// non-adaptive playlist that gates `graded` units.
///
/// # Examples
///
/// ```
/// use playlist_core::{AdaptiveConfig, SequencingMode};
///
/// let config = AdaptiveConfig::builder()
///     .mode(SequencingMode::Adaptive)
///     .mastery_threshold(0.9)
///     .build();
///
/// assert!(config.mode().is_adaptive());
/// assert!(!config.allow_learner_choice());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveConfig {
    /// Sequencing mode.
    #[builder(default)]
    #[serde(default)]
    mode: SequencingMode,

    /// Whether the learner may jump forward freely.
    #[builder(default)]
    #[serde(default)]
    allow_learner_choice: bool,

    /// Whether the first unit in sequence is a diagnostic gate.
    #[builder(default)]
    #[serde(default)]
    pre_assessment_enabled: bool,

    /// Minimum mastery for a node to count as mastered.
    #[builder(default = default_mastery_threshold())]
    #[serde(default = "default_mastery_threshold")]
    mastery_threshold: f64,

    /// Categories tagged as gates by the default gate policy.
    #[builder(default = default_gate_categories())]
    #[serde(default = "default_gate_categories")]
    gate_categories: Vec<UnitCategory>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AdaptiveConfig {
    /// Returns the sequencing mode.
    pub fn mode(&self) -> SequencingMode {
        self.mode
    }

    /// Returns whether learners may jump forward freely.
    pub fn allow_learner_choice(&self) -> bool {
        self.allow_learner_choice
    }

    /// Returns whether the first unit acts as a diagnostic gate.
    pub fn pre_assessment_enabled(&self) -> bool {
        self.pre_assessment_enabled
    }

    /// Returns the mastery threshold.
    pub fn mastery_threshold(&self) -> f64 {
        self.mastery_threshold
    }

    /// Returns the categories treated as gates.
    pub fn gate_categories(&self) -> &[UnitCategory] {
        &self.gate_categories
    }

    /// Check the tunables. The builder and serde accept any value, so every
    /// entry point that takes a config calls this before using it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MasteryOutOfRange` if the threshold is NaN or
    /// outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.mastery_threshold) {
            return Err(CoreError::MasteryOutOfRange {
                node_id: "masteryThreshold".to_owned(),
                mastery: self.mastery_threshold,
            });
        }
        Ok(())
    }
}

/// How the resolver picks the next entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequencingMode {
    /// Linear traversal. Gates still apply.
    #[default]
    Off,
    /// Mastery-based branching over non-required entries.
    Adaptive,
}

impl SequencingMode {
    /// Returns `true` for any mode that consults node mastery.
    pub fn is_adaptive(self) -> bool {
        !matches!(self, Self::Off)
    }
}

fn default_mastery_threshold() -> f64 {
    0.8
}

fn default_gate_categories() -> Vec<UnitCategory> {
    vec![UnitCategory::Graded]
}

/// Load [`AdaptiveConfig`] from a YAML file.
///
/// If the file does not exist, returns the default configuration.
///
/// # Errors
///
/// Returns `CoreError::Io` if the file exists but cannot be read.
/// Returns `CoreError::Yaml` if the file contains invalid YAML.
/// Returns `CoreError::MasteryOutOfRange` if the threshold is outside `[0, 1]`.
pub fn load_config(path: &Path) -> Result<AdaptiveConfig, CoreError> {
    if !path.exists() {
        return Ok(AdaptiveConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    let config: AdaptiveConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
