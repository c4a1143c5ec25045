//! Adapter for turning raw measurement rows into entity series
//!
//! Parses rows from NDJSON or a JSON array, validates each one at the
//! boundary, and groups the resulting measurements into per-entity series
//! ordered by timestamp.

use crate::error::PrepError;
use crate::schema::raw_measurement::{RawMeasurement, ValidationError};
use crate::types::{EntitySeries, Measurement};
use std::collections::BTreeMap;

/// Adapter for converting raw rows to entity series
pub struct MeasurementAdapter;

impl MeasurementAdapter {
    /// Parse a JSON string containing an array of rows
    pub fn parse_array(json: &str) -> Result<Vec<RawMeasurement>, PrepError> {
        let rows: Vec<RawMeasurement> = serde_json::from_str(json)?;
        Ok(rows)
    }

    /// Parse NDJSON (newline-delimited JSON) rows
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawMeasurement>, PrepError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawMeasurement>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(PrepError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(rows)
    }

    /// Convert rows to per-entity series
    ///
    /// Any invalid row fails the whole batch. Series are returned ordered by
    /// entity id; each series is stably sorted by timestamp.
    pub fn to_series(rows: Vec<RawMeasurement>) -> Result<Vec<EntitySeries>, PrepError> {
        let mut by_entity: BTreeMap<String, Vec<Measurement>> = BTreeMap::new();
        let mut filled = 0usize;

        for (idx, row) in rows.into_iter().enumerate() {
            let measurement = row.into_measurement().map_err(|e| {
                PrepError::ParseError(format!("Invalid row {}: {}", idx, e))
            })?;
            if !measurement.quality_flags.is_empty() {
                filled += 1;
            }
            by_entity
                .entry(measurement.device_id.clone())
                .or_default()
                .push(measurement);
        }

        if filled > 0 {
            log::info!("{} rows had missing values filled at ingestion", filled);
        }

        by_entity
            .into_iter()
            .map(|(entity_id, mut measurements)| {
                measurements.sort_by_key(|m| m.measured_at);
                EntitySeries::new(entity_id, measurements)
            })
            .collect()
    }

    /// Validate a batch of rows, returning only the failures
    pub fn validate_rows(rows: &[RawMeasurement]) -> Vec<ValidationResult> {
        rows.iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                row.validate().err().map(|error| ValidationResult {
                    index: idx,
                    device_id: row.device_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A row that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub device_id: Option<String>,
    pub error: ValidationError,
}
