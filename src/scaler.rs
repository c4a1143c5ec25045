//! Min/max feature scaling
//!
//! Fits per-feature minimum and maximum over a training corpus and applies the
//! same mapping at inference time from the persisted [`ScalerParams`].
//! - Missing (non-finite) values are treated as 0 before fitting and scaling
//! - A feature whose minimum equals its maximum scales to 0
//! - Parameters carry a schema version and the ordered feature names

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current scaler artifact schema
pub const SCALER_SCHEMA_VERSION: &str = "aeroguard.scaler_params.v1";

/// Persisted normalization parameters
///
/// `min`, `max` and `feature_names` are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub schema_version: String,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl ScalerParams {
    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }

    /// Check schema version and list alignment
    pub fn validate(&self) -> Result<(), PrepError> {
        if self.schema_version != SCALER_SCHEMA_VERSION {
            return Err(PrepError::SchemaMismatch(format!(
                "expected scaler schema {}, got {}",
                SCALER_SCHEMA_VERSION, self.schema_version
            )));
        }

        if self.min.len() != self.feature_names.len() || self.max.len() != self.feature_names.len() {
            return Err(PrepError::SchemaMismatch(format!(
                "scaler lists are not aligned: {} names, {} min, {} max",
                self.feature_names.len(),
                self.min.len(),
                self.max.len()
            )));
        }

        if let Some(idx) = self
            .min
            .iter()
            .zip(&self.max)
            .position(|(lo, hi)| !lo.is_finite() || !hi.is_finite() || lo > hi)
        {
            return Err(PrepError::SchemaMismatch(format!(
                "invalid range for feature '{}'",
                self.feature_names[idx]
            )));
        }

        Ok(())
    }

    /// Check that the parameters were fitted on exactly these features, in order
    pub fn check_features<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), PrepError> {
        let matches = self.feature_names.len() == expected.len()
            && self
                .feature_names
                .iter()
                .zip(expected)
                .all(|(have, want)| have == want.as_ref());

        if matches {
            Ok(())
        } else {
            Err(PrepError::SchemaMismatch(format!(
                "scaler features [{}] do not match expected [{}]",
                self.feature_names.join(", "),
                expected.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", ")
            )))
        }
    }

    /// Load and validate parameters from JSON
    pub fn from_json(json: &str) -> Result<Self, PrepError> {
        let params: ScalerParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize parameters to JSON
    pub fn to_json(&self) -> Result<String, PrepError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read parameters from a file written by [`ScalerParams::save`]
    pub fn load(path: &Path) -> Result<Self, PrepError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write parameters to a file
    pub fn save(&self, path: &Path) -> Result<(), PrepError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        log::info!(
            "Saved scaler params ({} features) to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }
}

/// Min/max scaler over row-major feature matrices
pub struct FeatureScaler;

impl FeatureScaler {
    /// Fit per-feature minimum and maximum over all rows
    pub fn fit<S: AsRef<str>>(rows: &[Vec<f64>], feature_names: &[S]) -> Result<ScalerParams, PrepError> {
        if feature_names.is_empty() {
            return Err(PrepError::InvalidArgument(
                "scaler needs at least one feature".to_string(),
            ));
        }
        if rows.is_empty() {
            return Err(PrepError::InsufficientData(
                "cannot fit scaler on an empty corpus".to_string(),
            ));
        }

        let width = feature_names.len();
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];

        for (row_idx, row) in rows.iter().enumerate() {
            check_width(row, width, row_idx)?;
            for (col, &raw) in row.iter().enumerate() {
                let value = fill_missing(raw);
                min[col] = min[col].min(value);
                max[col] = max[col].max(value);
            }
        }

        log::debug!("Fitted scaler over {} rows x {} features", rows.len(), width);

        Ok(ScalerParams {
            schema_version: SCALER_SCHEMA_VERSION.to_string(),
            min,
            max,
            feature_names: feature_names.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Scale every row with previously fitted parameters
    pub fn apply(rows: &[Vec<f64>], params: &ScalerParams) -> Result<Vec<Vec<f64>>, PrepError> {
        params.validate()?;
        rows.iter()
            .enumerate()
            .map(|(row_idx, row)| {
                check_width(row, params.len(), row_idx)?;
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(col, &x)| scale_value(x, params.min[col], params.max[col]))
                    .collect())
            })
            .collect()
    }

    /// Map scaled rows back to original units
    ///
    /// Constant features cannot be recovered from their scaled 0 and come back
    /// as the fitted constant.
    pub fn invert(rows: &[Vec<f64>], params: &ScalerParams) -> Result<Vec<Vec<f64>>, PrepError> {
        params.validate()?;
        rows.iter()
            .enumerate()
            .map(|(row_idx, row)| {
                check_width(row, params.len(), row_idx)?;
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(col, &x)| invert_value(x, params.min[col], params.max[col]))
                    .collect())
            })
            .collect()
    }
}

/// Scale a single value into the fitted range
pub fn scale_value(x: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range == 0.0 {
        return 0.0;
    }
    (fill_missing(x) - min) / range
}

/// Inverse of [`scale_value`]
pub fn invert_value(scaled: f64, min: f64, max: f64) -> f64 {
    scaled * (max - min) + min
}

fn fill_missing(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

fn check_width(row: &[f64], width: usize, row_idx: usize) -> Result<(), PrepError> {
    if row.len() != width {
        return Err(PrepError::ShapeMismatch(format!(
            "row {} has {} values, expected {}",
            row_idx,
            row.len(),
            width
        )));
    }
    Ok(())
}
