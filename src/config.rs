//! Preparation settings
//!
//! Settings are read from an optional JSON file; every field has a default so
//! partial files are accepted.

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of historical steps per forecast input
pub const DEFAULT_LOOKBACK: usize = 24;
/// Default number of future steps per forecast
pub const DEFAULT_HORIZON: usize = 24;
/// Default history fetched for training
pub const DEFAULT_HISTORY_DAYS: u32 = 90;

/// Scaler parameters file name inside the models directory
pub const SCALER_PARAMS_FILE: &str = "scaler_params.json";
/// Classifier metadata file name inside the models directory
pub const CLASSIFIER_METADATA_FILE: &str = "health_risk_metadata.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub lookback: usize,
    pub horizon: usize,
    /// Days of history the storage collaborator should supply
    pub history_days: u32,
    /// Directory holding persisted artifacts
    pub models_dir: PathBuf,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            horizon: DEFAULT_HORIZON,
            history_days: DEFAULT_HISTORY_DAYS,
            models_dir: PathBuf::from("models"),
        }
    }
}

impl PrepConfig {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, PrepError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, PrepError> {
        let config: PrepConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        if self.lookback == 0 {
            return Err(PrepError::InvalidConfig("lookback must be at least 1".to_string()));
        }
        if self.horizon == 0 {
            return Err(PrepError::InvalidConfig("horizon must be at least 1".to_string()));
        }
        if self.history_days == 0 {
            return Err(PrepError::InvalidConfig(
                "history_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scaler_params_path(&self) -> PathBuf {
        self.models_dir.join(SCALER_PARAMS_FILE)
    }

    pub fn classifier_metadata_path(&self) -> PathBuf {
        self.models_dir.join(CLASSIFIER_METADATA_FILE)
    }
}
