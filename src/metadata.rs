//! Health-risk classifier metadata artifact
//!
//! Records the feature order, class names and feature importances of a
//! trained classifier so the inference side can build inputs in the same
//! order and report labels by name.

use crate::error::PrepError;
use crate::types::RiskLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Importance of one classifier feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Persisted classifier metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierMetadata {
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    /// Sorted by importance, descending
    pub feature_importance: Vec<FeatureImportance>,
}

impl ClassifierMetadata {
    /// Build metadata from the training feature order and per-feature importances
    pub fn new<S: AsRef<str>>(feature_names: &[S], importances: &[f64]) -> Result<Self, PrepError> {
        if feature_names.len() != importances.len() {
            return Err(PrepError::ShapeMismatch(format!(
                "{} feature names but {} importances",
                feature_names.len(),
                importances.len()
            )));
        }
        if let Some(bad) = importances.iter().find(|v| !v.is_finite()) {
            return Err(PrepError::InvalidArgument(format!(
                "feature importance must be finite, got {}",
                bad
            )));
        }

        let mut feature_importance: Vec<FeatureImportance> = feature_names
            .iter()
            .zip(importances)
            .map(|(name, &importance)| FeatureImportance {
                feature: name.as_ref().to_string(),
                importance,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        Ok(Self {
            feature_names: feature_names.iter().map(|s| s.as_ref().to_string()).collect(),
            classes: Self::default_classes(),
            feature_importance,
        })
    }

    /// Class names in label order
    pub fn default_classes() -> Vec<String> {
        RiskLevel::ALL.iter().map(|l| l.label().to_string()).collect()
    }

    /// Check the fixed class list and importance coverage
    pub fn validate(&self) -> Result<(), PrepError> {
        if self.classes != Self::default_classes() {
            return Err(PrepError::SchemaMismatch(format!(
                "unexpected classes [{}]",
                self.classes.join(", ")
            )));
        }
        if self.feature_importance.len() != self.feature_names.len() {
            return Err(PrepError::SchemaMismatch(format!(
                "{} importances for {} features",
                self.feature_importance.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, PrepError> {
        let metadata: ClassifierMetadata = serde_json::from_str(json)?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn to_json(&self) -> Result<String, PrepError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, PrepError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PrepError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
