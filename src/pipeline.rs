//! Dataset preparation
//!
//! This module provides the public API for AeroGuard Prep. It turns validated
//! entity series into the fixed-shape arrays and persisted metadata that the
//! external model-training stage consumes, and reproduces the training-time
//! normalization at inference.

use crate::aggregator::DailyAggregator;
use crate::config::PrepConfig;
use crate::error::PrepError;
use crate::scaler::{invert_value, FeatureScaler, ScalerParams};
use crate::types::{DailyAggregate, EntitySeries, Feature, Measurement};
use chrono::Duration;
use crate::windower::{ForecastArrays, NormalizedSeries, SequenceWindower, WindowSet};
use ndarray::{Array1, Array2};

/// Forecast input columns, in scaler order.
///
/// The forecast target is column [`FORECAST_TARGET_INDEX`]; reordering this list
/// invalidates every persisted scaler artifact.
pub const FORECAST_FEATURES: [Feature; 7] = [
    Feature::AqiCalculated,
    Feature::IaqScore,
    Feature::Temperature,
    Feature::Humidity,
    Feature::PressureHpa,
    Feature::HourOfDay,
    Feature::DayOfWeek,
];

/// Column of [`FORECAST_FEATURES`] predicted by the forecaster (`aqi_calculated`)
pub const FORECAST_TARGET_INDEX: usize = 0;

/// Classifier input columns, in [`DailyAggregate`] order
pub const CLASSIFIER_FEATURES: [&str; 7] = [
    "avg_aqi",
    "max_aqi",
    "std_aqi",
    "avg_iaq",
    "avg_temp",
    "avg_hum",
    "avg_pressure",
];

/// Names of [`FORECAST_FEATURES`] as stored in scaler artifacts
pub fn forecast_feature_names() -> Vec<&'static str> {
    FORECAST_FEATURES.iter().map(|f| f.as_str()).collect()
}

/// Training data for the sequence forecaster
#[derive(Debug, Clone)]
pub struct ForecastDataset {
    /// Parameters to persist for inference
    pub params: ScalerParams,
    pub windows: WindowSet,
    pub arrays: ForecastArrays,
}

/// Training data for the daily risk classifier
#[derive(Debug, Clone)]
pub struct ClassificationDataset {
    pub aggregates: Vec<DailyAggregate>,
    /// Shape (days, 7) in [`CLASSIFIER_FEATURES`] order
    pub x: Array2<f64>,
    /// Risk class per day
    pub y: Array1<u8>,
    /// Days per risk class
    pub distribution: [usize; 4],
}

/// Keep only measurements within `history_days` of the newest timestamp
///
/// The cutoff is shared by every entity. Entities with no remaining
/// measurements are dropped.
pub fn limit_history(series: &[EntitySeries], history_days: u32) -> Vec<EntitySeries> {
    let Some(newest) = series
        .iter()
        .filter_map(|s| s.measurements.last())
        .map(|m| m.measured_at)
        .max()
    else {
        return Vec::new();
    };
    let cutoff = newest - Duration::days(i64::from(history_days));

    let mut dropped = 0usize;
    let limited: Vec<EntitySeries> = series
        .iter()
        .filter_map(|s| {
            let recent: Vec<Measurement> = s
                .measurements
                .iter()
                .filter(|m| m.measured_at >= cutoff)
                .cloned()
                .collect();
            dropped += s.measurements.len() - recent.len();
            (!recent.is_empty()).then(|| EntitySeries {
                entity_id: s.entity_id.clone(),
                measurements: recent,
            })
        })
        .collect();

    if dropped > 0 {
        log::info!(
            "Dropped {} measurements older than {} days before {}",
            dropped,
            history_days,
            newest
        );
    }

    limited
}

/// Fit the scaler over every entity, normalize, and window per entity.
///
/// Only the last `history_days` of measurements are used (see
/// [`limit_history`]). Fails with [`PrepError::InsufficientData`] when no entity is long enough
/// for a single window.
pub fn prepare_forecast_dataset(
    series: &[EntitySeries],
    config: &PrepConfig,
) -> Result<ForecastDataset, PrepError> {
    config.validate()?;
    let windower = SequenceWindower::new(config.lookback, config.horizon, FORECAST_TARGET_INDEX)?;

    let recent = limit_history(series, config.history_days);
    let series = recent.as_slice();

    let matrices: Vec<Vec<Vec<f64>>> = series
        .iter()
        .map(|s| s.feature_matrix(&FORECAST_FEATURES))
        .collect();

    let corpus: Vec<Vec<f64>> = matrices.iter().flatten().cloned().collect();
    let params = FeatureScaler::fit(&corpus, forecast_feature_names().as_slice())?;

    let normalized = series
        .iter()
        .zip(&matrices)
        .map(|(s, rows)| {
            Ok(NormalizedSeries {
                entity_id: s.entity_id.clone(),
                rows: FeatureScaler::apply(rows, &params)?,
            })
        })
        .collect::<Result<Vec<_>, PrepError>>()?;

    let windows = windower.window(&normalized)?;
    windows.ensure_not_empty()?;
    let arrays = windows.to_arrays()?;

    log::info!(
        "Prepared {} forecast windows from {} measurements across {} entities",
        windows.len(),
        corpus.len(),
        series.len()
    );

    Ok(ForecastDataset {
        params,
        windows,
        arrays,
    })
}

/// Aggregate by entity and day and build classifier arrays
pub fn prepare_classification_dataset(
    series: &[EntitySeries],
) -> Result<ClassificationDataset, PrepError> {
    let aggregates = DailyAggregator::aggregate(series);
    if aggregates.is_empty() {
        return Err(PrepError::InsufficientData(
            "no measurements to aggregate".to_string(),
        ));
    }

    let mut x = Vec::with_capacity(aggregates.len() * CLASSIFIER_FEATURES.len());
    for day in &aggregates {
        x.extend_from_slice(&classifier_row(day));
    }
    let x = Array2::from_shape_vec((aggregates.len(), CLASSIFIER_FEATURES.len()), x)
        .map_err(|e| PrepError::ShapeMismatch(e.to_string()))?;
    let y: Array1<u8> = aggregates.iter().map(|d| d.risk_level.as_u8()).collect();
    let distribution = DailyAggregator::risk_distribution(&aggregates);

    log::info!(
        "Prepared {} daily aggregates, risk distribution {:?}",
        aggregates.len(),
        distribution
    );

    Ok(ClassificationDataset {
        aggregates,
        x,
        y,
        distribution,
    })
}

/// Classifier feature vector for one day, in [`CLASSIFIER_FEATURES`] order
pub fn classifier_row(day: &DailyAggregate) -> [f64; 7] {
    [
        day.avg_aqi,
        day.max_aqi,
        day.std_aqi,
        day.avg_iaq,
        day.avg_temp,
        day.avg_hum,
        day.avg_pressure,
    ]
}

/// Inference-side normalization using persisted scaler parameters.
///
/// Use this in the serving process; it never re-fits.
#[derive(Debug, Clone)]
pub struct ForecastPreparer {
    params: ScalerParams,
    lookback: usize,
}

impl ForecastPreparer {
    /// Create a preparer, checking the parameters match the forecast feature order
    pub fn new(params: ScalerParams, lookback: usize) -> Result<Self, PrepError> {
        params.validate()?;
        params.check_features(forecast_feature_names().as_slice())?;
        if lookback == 0 {
            return Err(PrepError::InvalidArgument(
                "lookback must be at least 1".to_string(),
            ));
        }
        Ok(Self { params, lookback })
    }

    /// Load parameters from JSON
    pub fn from_json(json: &str, lookback: usize) -> Result<Self, PrepError> {
        Self::new(ScalerParams::from_json(json)?, lookback)
    }

    pub fn params(&self) -> &ScalerParams {
        &self.params
    }

    /// Scale the most recent `lookback` rows into a model input of shape (lookback, features)
    pub fn prepare_input(&self, series: &EntitySeries) -> Result<Array2<f64>, PrepError> {
        if series.len() < self.lookback {
            return Err(PrepError::InsufficientData(format!(
                "entity {} has {} rows, forecast needs {}",
                series.entity_id,
                series.len(),
                self.lookback
            )));
        }

        let rows = series.feature_matrix(&FORECAST_FEATURES);
        let recent = &rows[rows.len() - self.lookback..];
        let scaled = FeatureScaler::apply(recent, &self.params)?;

        let flat: Vec<f64> = scaled.into_iter().flatten().collect();
        Array2::from_shape_vec((self.lookback, FORECAST_FEATURES.len()), flat)
            .map_err(|e| PrepError::ShapeMismatch(e.to_string()))
    }

    /// Map normalized target predictions back to AQI units
    pub fn denormalize_forecast(&self, predictions: &[f64]) -> Vec<f64> {
        let min = self.params.min[FORECAST_TARGET_INDEX];
        let max = self.params.max[FORECAST_TARGET_INDEX];
        predictions
            .iter()
            .map(|&p| invert_value(p, min, max))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::make_measurement;
    use crate::types::RiskLevel;
    use pretty_assertions::assert_eq;

    fn series(device_id: &str, len: u32) -> EntitySeries {
        let rows = (0..len)
            .map(|h| make_measurement(device_id, h, 20.0 + h as f64 * 5.0))
            .collect();
        EntitySeries::new(device_id, rows).unwrap()
    }

    fn small_config() -> PrepConfig {
        PrepConfig {
            lookback: 4,
            horizon: 2,
            ..PrepConfig::default()
        }
    }

    #[test]
    fn test_feature_order_and_target() {
        assert_eq!(
            forecast_feature_names(),
            vec![
                "aqi_calculated",
                "iaq_score",
                "temperature",
                "humidity",
                "pressure_hpa",
                "hour_of_day",
                "day_of_week"
            ]
        );
        assert_eq!(FORECAST_FEATURES[FORECAST_TARGET_INDEX], Feature::AqiCalculated);
    }

    #[test]
    fn test_forecast_dataset_shapes() {
        let dataset =
            prepare_forecast_dataset(&[series("a", 10), series("b", 3)], &small_config()).unwrap();

        assert_eq!(dataset.windows.len(), 5);
        assert_eq!(dataset.windows.skipped.len(), 1);
        assert_eq!(dataset.arrays.x.shape(), &[5, 4, 7]);
        assert_eq!(dataset.arrays.y.shape(), &[5, 2]);
        assert!(dataset.arrays.x.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_scaler_fitted_over_all_entities() {
        let dataset =
            prepare_forecast_dataset(&[series("a", 10), series("b", 3)], &small_config()).unwrap();

        // AQI spans 20..65 across both entities
        assert_eq!(dataset.params.min[FORECAST_TARGET_INDEX], 20.0);
        assert_eq!(dataset.params.max[FORECAST_TARGET_INDEX], 65.0);
        // temperature is constant in the fixture
        assert!(dataset.arrays.x.iter().skip(2).step_by(7).all(|&v| v == 0.0));
    }

    #[test]
    fn test_forecast_dataset_insufficient_data() {
        let err = prepare_forecast_dataset(&[series("a", 5), series("b", 2)], &small_config())
            .unwrap_err();
        assert!(matches!(err, PrepError::InsufficientData(_)));
    }

    #[test]
    fn test_limit_history_uses_newest_timestamp() {
        let old = make_measurement("a", 0, 30.0);
        let recent = make_measurement("a", 24 * 20, 40.0);
        let newest = make_measurement("b", 24 * 31, 50.0);
        let a = EntitySeries::new("a", vec![old, recent]).unwrap();
        let b = EntitySeries::new("b", vec![newest]).unwrap();
        let stale = EntitySeries::new("c", vec![make_measurement("c", 1, 10.0)]).unwrap();

        let limited = limit_history(&[a, b, stale], 30);

        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].entity_id, "a");
        assert_eq!(limited[0].len(), 1);
        assert_eq!(limited[0].measurements[0].aqi_calculated, 40.0);
        assert_eq!(limited[1].entity_id, "b");
        assert!(limit_history(&[], 30).is_empty());
    }

    #[test]
    fn test_forecast_dataset_respects_history_days() {
        // "a" ends 3 days before "b"; a one-day history leaves only "b"
        let a = series("a", 10);
        let b_rows = (0..8)
            .map(|h| make_measurement("b", 24 * 3 + h, 50.0 + h as f64))
            .collect();
        let b = EntitySeries::new("b", b_rows).unwrap();
        let config = PrepConfig {
            history_days: 1,
            ..small_config()
        };

        let dataset = prepare_forecast_dataset(&[a, b], &config).unwrap();
        assert_eq!(dataset.windows.len(), 3);
        assert!(dataset.windows.windows.iter().all(|w| w.entity_id == "b"));
        assert_eq!(dataset.params.min[FORECAST_TARGET_INDEX], 50.0);
    }

    #[test]
    fn test_classification_dataset() {
        let dataset = prepare_classification_dataset(&[series("a", 30)]).unwrap();

        // hours 0..23 on day one, 24..29 on day two
        assert_eq!(dataset.aggregates.len(), 2);
        assert_eq!(dataset.x.shape(), &[2, 7]);
        assert_eq!(dataset.x[[0, 0]], 20.0 + 11.5 * 5.0);
        assert_eq!(dataset.y.to_vec(), vec![RiskLevel::Moderate as u8, RiskLevel::VeryHigh as u8]);
        assert_eq!(dataset.distribution, [0, 1, 0, 1]);
    }

    #[test]
    fn test_classification_dataset_empty() {
        assert!(matches!(
            prepare_classification_dataset(&[]),
            Err(PrepError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_preparer_reproduces_training_normalization() {
        let train = series("a", 10);
        let dataset = prepare_forecast_dataset(&[train.clone()], &small_config()).unwrap();

        let json = dataset.params.to_json().unwrap();
        let preparer = ForecastPreparer::from_json(&json, 4).unwrap();
        let input = preparer.prepare_input(&train).unwrap();

        // last training window starts at 10 - 6 = 4; inference uses rows 6..10
        let rows = train.feature_matrix(&FORECAST_FEATURES);
        let expected = FeatureScaler::apply(&rows[6..10], &dataset.params).unwrap();
        assert_eq!(input.shape(), &[4, 7]);
        for (r, row) in expected.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                assert_eq!(input[[r, c]], v);
            }
        }
    }

    #[test]
    fn test_preparer_rejects_short_series_and_foreign_params() {
        let dataset = prepare_forecast_dataset(&[series("a", 10)], &small_config()).unwrap();
        let preparer = ForecastPreparer::new(dataset.params.clone(), 4).unwrap();
        assert!(matches!(
            preparer.prepare_input(&series("b", 3)),
            Err(PrepError::InsufficientData(_))
        ));

        let foreign = FeatureScaler::fit(&[vec![1.0, 2.0]], &["aqi_calculated", "pm25_api"]).unwrap();
        assert!(matches!(
            ForecastPreparer::new(foreign, 4),
            Err(PrepError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_denormalize_forecast() {
        let dataset = prepare_forecast_dataset(&[series("a", 10)], &small_config()).unwrap();
        let preparer = ForecastPreparer::new(dataset.params, 4).unwrap();

        // AQI spans 20..65
        let restored = preparer.denormalize_forecast(&[0.0, 0.5, 1.0]);
        assert_eq!(restored, vec![20.0, 42.5, 65.0]);
    }
}
