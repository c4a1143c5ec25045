//! Daily aggregation and risk labeling
//!
//! Groups each entity's measurements by calendar date, summarizes the AQI and
//! environmental features, and labels every day with a fixed-threshold risk
//! class. Dates are the date component of each timestamp as recorded; no
//! timezone normalization is applied.

use crate::types::{DailyAggregate, EntitySeries, Measurement, RiskLevel};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Aggregator for per-entity daily summaries
pub struct DailyAggregator;

impl DailyAggregator {
    /// Aggregate every series into daily records, ordered by entity then date
    pub fn aggregate(series: &[EntitySeries]) -> Vec<DailyAggregate> {
        let mut groups: BTreeMap<(&str, NaiveDate), Vec<&Measurement>> = BTreeMap::new();

        for entity in series {
            for m in &entity.measurements {
                groups
                    .entry((entity.entity_id.as_str(), m.date()))
                    .or_default()
                    .push(m);
            }
        }

        let aggregates: Vec<DailyAggregate> = groups
            .into_iter()
            .map(|((device_id, date), day)| summarize_day(device_id, date, &day))
            .collect();

        log::debug!(
            "Aggregated {} daily records from {} entities",
            aggregates.len(),
            series.len()
        );

        aggregates
    }

    /// Count of days per risk class, indexed by class value
    pub fn risk_distribution(aggregates: &[DailyAggregate]) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for agg in aggregates {
            counts[agg.risk_level.as_u8() as usize] += 1;
        }
        counts
    }
}

fn summarize_day(device_id: &str, date: NaiveDate, day: &[&Measurement]) -> DailyAggregate {
    let aqi: Vec<f64> = day.iter().map(|m| m.aqi_calculated).collect();
    let avg_aqi = mean(&aqi);

    DailyAggregate {
        device_id: device_id.to_string(),
        date,
        avg_aqi,
        max_aqi: aqi.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_aqi: sample_std(&aqi, avg_aqi),
        avg_iaq: mean_of(day, |m| m.iaq_score),
        avg_temp: mean_of(day, |m| m.temperature),
        avg_hum: mean_of(day, |m| m.humidity),
        avg_pressure: mean_of(day, |m| m.pressure_hpa),
        measurement_count: day.len(),
        risk_level: RiskLevel::from_avg_aqi(avg_aqi),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_of(day: &[&Measurement], field: impl Fn(&Measurement) -> f64) -> f64 {
    if day.is_empty() {
        return 0.0;
    }
    day.iter().map(|m| field(m)).sum::<f64>() / day.len() as f64
}

/// Sample (n - 1) standard deviation; 0 when fewer than two values
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MeasurementAdapter;
    use crate::types::tests::make_measurement;
    use pretty_assertions::assert_eq;

    fn series(device_id: &str, readings: &[(u32, f64)]) -> EntitySeries {
        let rows = readings
            .iter()
            .map(|&(hour, aqi)| make_measurement(device_id, hour, aqi))
            .collect();
        EntitySeries::new(device_id, rows).unwrap()
    }

    #[test]
    fn test_daily_statistics() {
        let s = series("dev-1", &[(0, 40.0), (6, 60.0), (12, 80.0)]);
        let aggregates = DailyAggregator::aggregate(&[s]);

        assert_eq!(aggregates.len(), 1);
        let day = &aggregates[0];
        assert_eq!(day.avg_aqi, 60.0);
        assert_eq!(day.max_aqi, 80.0);
        assert!((day.std_aqi - 20.0).abs() < 1e-9);
        assert_eq!(day.avg_temp, 22.0);
        assert_eq!(day.measurement_count, 3);
        assert_eq!(day.risk_level, RiskLevel::Moderate);
    }

    #[test]
    fn test_single_measurement_day_has_zero_std() {
        let s = series("dev-1", &[(3, 120.0)]);
        let aggregates = DailyAggregator::aggregate(&[s]);

        assert_eq!(aggregates[0].std_aqi, 0.0);
        assert_eq!(aggregates[0].risk_level, RiskLevel::High);
    }

    #[test]
    fn test_groups_by_calendar_day() {
        // hours 20..28 straddle midnight of 2024-03-04
        let s = series("dev-1", &[(20, 10.0), (23, 20.0), (24, 200.0), (27, 160.0)]);
        let aggregates = DailyAggregator::aggregate(&[s]);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(aggregates[0].avg_aqi, 15.0);
        assert_eq!(aggregates[0].risk_level, RiskLevel::Low);
        assert_eq!(aggregates[1].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(aggregates[1].avg_aqi, 180.0);
        assert_eq!(aggregates[1].risk_level, RiskLevel::VeryHigh);
    }

    #[test]
    fn test_offset_timestamps_group_by_recorded_date() {
        let rows = MeasurementAdapter::parse_ndjson(
            r#"{"device_id":"dev-in","measured_at":"2024-03-04T23:30:00+05:30","aqi_calculated":20.0}
{"device_id":"dev-in","measured_at":"2024-03-05T01:00:00+05:30","aqi_calculated":180.0}"#,
        )
        .unwrap();
        let series = MeasurementAdapter::to_series(rows).unwrap();
        assert_eq!(series[0].measurements[1].hour_of_day, 1);

        let aggregates = DailyAggregator::aggregate(&series);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(aggregates[0].risk_level, RiskLevel::Low);
        assert_eq!(aggregates[1].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(aggregates[1].avg_aqi, 180.0);
        assert_eq!(aggregates[1].risk_level, RiskLevel::VeryHigh);
    }

    #[test]
    fn test_entities_never_share_a_day() {
        let a = series("dev-a", &[(1, 10.0), (2, 10.0)]);
        let b = series("dev-b", &[(1, 190.0)]);
        let aggregates = DailyAggregator::aggregate(&[b, a]);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].device_id, "dev-a");
        assert_eq!(aggregates[0].avg_aqi, 10.0);
        assert_eq!(aggregates[1].device_id, "dev-b");
        assert_eq!(aggregates[1].avg_aqi, 190.0);
    }

    #[test]
    fn test_risk_distribution() {
        let s1 = series("dev-1", &[(0, 10.0), (24, 75.0), (48, 75.0)]);
        let s2 = series("dev-2", &[(0, 400.0)]);
        let aggregates = DailyAggregator::aggregate(&[s1, s2]);

        assert_eq!(DailyAggregator::risk_distribution(&aggregates), [1, 2, 0, 1]);
    }
}
