//! Measurement ingestion schema
//!
//! This module defines the typed row format delivered by the measurement
//! store and the adapter that validates rows and groups them into series.

mod adapter;
mod raw_measurement;

pub use adapter::*;
pub use raw_measurement::*;
