//! Core types for the AeroGuard preparation pipeline
//!
//! This module defines the records that flow through each stage: validated
//! measurements, per-entity series, daily aggregates, and the exposure
//! scoring input/output.

use crate::error::PrepError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Numeric sensor feature carried by a [`Measurement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AqiCalculated,
    IaqScore,
    Co2Equiv,
    Temperature,
    Humidity,
    PressureHpa,
    Pm25Api,
    HourOfDay,
    DayOfWeek,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::AqiCalculated => "aqi_calculated",
            Feature::IaqScore => "iaq_score",
            Feature::Co2Equiv => "co2_equiv",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::PressureHpa => "pressure_hpa",
            Feature::Pm25Api => "pm25_api",
            Feature::HourOfDay => "hour_of_day",
            Feature::DayOfWeek => "day_of_week",
        }
    }
}

/// US EPA air-quality category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Category for an AQI value using the EPA breakpoints
    pub fn from_aqi(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Moderate
        } else if aqi <= 150.0 {
            AqiCategory::UnhealthySensitive
        } else if aqi <= 200.0 {
            AqiCategory::Unhealthy
        } else if aqi <= 300.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Parse the category labels written by the storage layer
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "good" => Some(AqiCategory::Good),
            "moderate" => Some(AqiCategory::Moderate),
            "unhealthy_sensitive" | "unhealthy_for_sensitive_groups" | "usg" => {
                Some(AqiCategory::UnhealthySensitive)
            }
            "unhealthy" => Some(AqiCategory::Unhealthy),
            "very_unhealthy" => Some(AqiCategory::VeryUnhealthy),
            "hazardous" => Some(AqiCategory::Hazardous),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "good",
            AqiCategory::Moderate => "moderate",
            AqiCategory::UnhealthySensitive => "unhealthy_sensitive",
            AqiCategory::Unhealthy => "unhealthy",
            AqiCategory::VeryUnhealthy => "very_unhealthy",
            AqiCategory::Hazardous => "hazardous",
        }
    }
}

/// Quality flag recording how a measurement was completed at ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// A null sensor value was replaced with 0
    FilledWithZero(Feature),
    /// Hour of day computed from the timestamp
    DerivedHourOfDay,
    /// Day of week computed from the timestamp
    DerivedDayOfWeek,
    /// Category computed from the AQI value
    DerivedCategory,
}

/// A single validated sensor reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Entity (device) identifier
    pub device_id: String,
    /// Measurement timestamp with the offset it was recorded in
    pub measured_at: DateTime<FixedOffset>,
    /// Calculated air-quality index (forecast target)
    pub aqi_calculated: f64,
    /// Indoor air-quality score
    pub iaq_score: f64,
    /// CO2-equivalent concentration (ppm)
    pub co2_equiv: f64,
    /// Temperature (celsius)
    pub temperature: f64,
    /// Relative humidity (percentage)
    pub humidity: f64,
    /// Barometric pressure (hPa)
    pub pressure_hpa: f64,
    /// PM2.5 concentration (µg/m³)
    pub pm25_api: f64,
    /// Air-quality category
    pub aqi_category: AqiCategory,
    /// Hour of day, 0-23
    pub hour_of_day: u32,
    /// Day of week, 0-6 with 0 = Sunday
    pub day_of_week: u32,
    /// Substitutions applied at ingestion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_flags: Vec<QualityFlag>,
}

impl Measurement {
    /// Value of a numeric feature
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::AqiCalculated => self.aqi_calculated,
            Feature::IaqScore => self.iaq_score,
            Feature::Co2Equiv => self.co2_equiv,
            Feature::Temperature => self.temperature,
            Feature::Humidity => self.humidity,
            Feature::PressureHpa => self.pressure_hpa,
            Feature::Pm25Api => self.pm25_api,
            Feature::HourOfDay => self.hour_of_day as f64,
            Feature::DayOfWeek => self.day_of_week as f64,
        }
    }

    /// Calendar date of the timestamp, read from its own wall clock
    pub fn date(&self) -> NaiveDate {
        self.measured_at.date_naive()
    }
}

/// Time-ordered measurements for a single entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySeries {
    pub entity_id: String,
    pub measurements: Vec<Measurement>,
}

impl EntitySeries {
    /// Build a series, checking entity ownership and timestamp order
    pub fn new(entity_id: impl Into<String>, measurements: Vec<Measurement>) -> Result<Self, PrepError> {
        let entity_id = entity_id.into();

        if let Some(foreign) = measurements.iter().find(|m| m.device_id != entity_id) {
            return Err(PrepError::InvalidArgument(format!(
                "measurement from '{}' in series for '{}'",
                foreign.device_id, entity_id
            )));
        }

        if let Some(pos) = measurements
            .windows(2)
            .position(|pair| pair[1].measured_at < pair[0].measured_at)
        {
            return Err(PrepError::InvalidArgument(format!(
                "series '{}' is not ordered by timestamp at row {}",
                entity_id,
                pos + 1
            )));
        }

        Ok(Self {
            entity_id,
            measurements,
        })
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Row-major feature matrix in the given column order
    pub fn feature_matrix(&self, features: &[Feature]) -> Vec<Vec<f64>> {
        self.measurements
            .iter()
            .map(|m| features.iter().map(|&f| m.value(f)).collect())
            .collect()
    }
}

/// Discrete daily health-risk class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskLevel {
    Low = 0,
    Moderate = 1,
    High = 2,
    VeryHigh = 3,
}

impl RiskLevel {
    /// All classes in label order
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::VeryHigh,
    ];

    /// Step function over the daily mean AQI
    pub fn from_avg_aqi(avg_aqi: f64) -> Self {
        if avg_aqi < 50.0 {
            RiskLevel::Low
        } else if avg_aqi < 100.0 {
            RiskLevel::Moderate
        } else if avg_aqi < 150.0 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Class name used in classifier metadata
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

impl From<RiskLevel> for u8 {
    fn from(level: RiskLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for RiskLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RiskLevel::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("risk level must be 0-3, got {}", value))
    }
}

/// Per-entity, per-calendar-day summary with derived risk label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub device_id: String,
    pub date: NaiveDate,
    pub avg_aqi: f64,
    pub max_aqi: f64,
    /// Sample standard deviation; 0 for single-measurement days
    pub std_aqi: f64,
    pub avg_iaq: f64,
    pub avg_temp: f64,
    pub avg_hum: f64,
    pub avg_pressure: f64,
    pub measurement_count: usize,
    pub risk_level: RiskLevel,
}

/// Aggregate particulate exposure for one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureProfile {
    /// Average PM2.5 (µg/m³)
    pub avg_pm25: f64,
    /// Peak PM2.5 (µg/m³)
    pub peak_pm25: f64,
    /// Hours spent above the unhealthy threshold
    pub hours_unhealthy: f64,
    /// Length of the exposure period
    pub duration_days: u32,
}

/// Rule-based disease risk scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreSet {
    pub asthma_risk: f64,
    pub copd_risk: f64,
    pub cardiovascular_risk: f64,
    pub allergy_risk: f64,
}
