//! AeroGuard Prep - Deterministic feature preparation for air-quality models
//!
//! Prep turns validated sensor measurements into model-ready inputs and scores
//! exposure-driven disease risk:
//! ingestion → min/max scaling → lookback/horizon windowing (forecasting)
//! ingestion → daily aggregation → risk labels (classification)
//! exposure profile → rule-based risk scores
//!
//! Model training is external; it consumes the fixed-shape arrays and the
//! persisted scaler and classifier metadata produced here.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod exposure;
pub mod metadata;
pub mod pipeline;
pub mod scaler;
pub mod schema;
pub mod types;
pub mod windower;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::DailyAggregator;
pub use config::PrepConfig;
pub use error::PrepError;
pub use exposure::ExposureScorer;
pub use metadata::ClassifierMetadata;
pub use pipeline::{
    limit_history, prepare_classification_dataset, prepare_forecast_dataset, ForecastPreparer,
    FORECAST_FEATURES, FORECAST_TARGET_INDEX,
};
pub use scaler::{FeatureScaler, ScalerParams};
pub use windower::{SequenceWindower, Window, WindowSet};

// Schema exports
pub use schema::{MeasurementAdapter, RawMeasurement, SCHEMA_VERSION};

/// Crate version recorded in CLI reports
pub const PREP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI reports
pub const PRODUCER_NAME: &str = "aeroguard-prep";
