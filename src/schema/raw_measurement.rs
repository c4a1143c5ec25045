//! aeroguard.measurement.v1 row schema
//!
//! One row as delivered by the measurement store. Every column is optional on
//! the wire so that a missing required column is reported as a validation
//! error instead of a deserialization failure.
//!
//! Timestamps keep the wall clock they were recorded in. Calendar fields are
//! read from that wall clock and are never shifted to another zone.

use crate::types::{AqiCategory, Feature, Measurement, QualityFlag};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

/// Current row schema identifier
pub const SCHEMA_VERSION: &str = "aeroguard.measurement.v1";

/// Raw measurement row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMeasurement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// RFC 3339, or a plain `YYYY-MM-DD HH:MM:SS` store timestamp
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub measured_at: Option<DateTime<FixedOffset>>,
    /// Forecast target; rows without it are rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi_calculated: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iaq_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2_equiv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25_api: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi_category: Option<String>,
    /// SQL `EXTRACT(HOUR ...)` arrives as a float
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<f64>,
    /// SQL `EXTRACT(DOW ...)`, 0 = Sunday
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<f64>,
}

impl RawMeasurement {
    /// Validate required columns and value ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.device_id.as_deref() {
            None => return Err(ValidationError::MissingField("device_id")),
            Some(id) if id.trim().is_empty() => return Err(ValidationError::EmptyDeviceId),
            Some(_) => {}
        }

        if self.measured_at.is_none() {
            return Err(ValidationError::MissingField("measured_at"));
        }

        match self.aqi_calculated {
            None => return Err(ValidationError::MissingField("aqi_calculated")),
            Some(v) if !v.is_finite() => {
                return Err(ValidationError::NotFinite("aqi_calculated"))
            }
            Some(_) => {}
        }

        check_calendar_field("hour_of_day", self.hour_of_day, 23)?;
        check_calendar_field("day_of_week", self.day_of_week, 6)?;

        if let Some(label) = &self.aqi_category {
            if AqiCategory::parse(label).is_none() {
                return Err(ValidationError::UnknownCategory(label.clone()));
            }
        }

        Ok(())
    }

    /// Convert into a [`Measurement`], filling null sensor values with 0
    ///
    /// Hour of day, day of week and category are derived from the timestamp and
    /// AQI when absent. Every substitution is recorded as a quality flag.
    pub fn into_measurement(self) -> Result<Measurement, ValidationError> {
        self.validate()?;

        let Some(device_id) = self.device_id else {
            return Err(ValidationError::MissingField("device_id"));
        };
        let Some(measured_at) = self.measured_at else {
            return Err(ValidationError::MissingField("measured_at"));
        };
        let Some(aqi) = self.aqi_calculated else {
            return Err(ValidationError::MissingField("aqi_calculated"));
        };

        let mut flags = Vec::new();
        let mut fill = |feature: Feature, value: Option<f64>| match value {
            Some(v) if v.is_finite() => v,
            _ => {
                flags.push(QualityFlag::FilledWithZero(feature));
                0.0
            }
        };

        let iaq_score = fill(Feature::IaqScore, self.iaq_score);
        let co2_equiv = fill(Feature::Co2Equiv, self.co2_equiv);
        let temperature = fill(Feature::Temperature, self.temperature);
        let humidity = fill(Feature::Humidity, self.humidity);
        let pressure_hpa = fill(Feature::PressureHpa, self.pressure_hpa);
        let pm25_api = fill(Feature::Pm25Api, self.pm25_api);

        let hour_of_day = match self.hour_of_day {
            Some(h) => h as u32,
            None => {
                flags.push(QualityFlag::DerivedHourOfDay);
                measured_at.hour()
            }
        };

        let day_of_week = match self.day_of_week {
            Some(d) => d as u32,
            None => {
                flags.push(QualityFlag::DerivedDayOfWeek);
                measured_at.weekday().num_days_from_sunday()
            }
        };

        let aqi_category = match self.aqi_category.as_deref().and_then(AqiCategory::parse) {
            Some(category) => category,
            None => {
                flags.push(QualityFlag::DerivedCategory);
                AqiCategory::from_aqi(aqi)
            }
        };

        Ok(Measurement {
            device_id,
            measured_at,
            aqi_calculated: aqi,
            iaq_score,
            co2_equiv,
            temperature,
            humidity,
            pressure_hpa,
            pm25_api,
            aqi_category,
            hour_of_day,
            day_of_week,
            quality_flags: flags,
        })
    }
}

/// Parse a store timestamp without moving it to another zone
///
/// Accepts RFC 3339 and the space-separated form with or without an offset.
/// A timestamp without an offset is kept as wall-clock time at offset zero.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    let zero = FixedOffset::east_opt(0)?;
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| zero.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

fn check_calendar_field(
    field: &'static str,
    value: Option<f64>,
    max: u32,
) -> Result<(), ValidationError> {
    if let Some(v) = value {
        if !v.is_finite() || v.fract() != 0.0 || v < 0.0 || v > max as f64 {
            return Err(ValidationError::OutOfRange { field, value: v, max });
        }
    }
    Ok(())
}

/// Validation errors for raw measurement rows
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Empty device_id")]
    EmptyDeviceId,

    #[error("Field {0} is not a finite number")]
    NotFinite(&'static str),

    #[error("Field {field} = {value} is outside 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        max: u32,
    },

    #[error("Unknown air-quality category: {0}")]
    UnknownCategory(String),
}
