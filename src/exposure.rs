//! Rule-based disease risk scoring
//!
//! Maps an aggregate PM2.5 exposure profile to four bounded risk scores using
//! fixed epidemiological weightings. Scoring is pure and deterministic.

use crate::error::PrepError;
use crate::types::{ExposureProfile, RiskScoreSet};

/// PM2.5 level (µg/m³) at which the asthma base score reaches 50
const ASTHMA_REFERENCE_PM25: f64 = 35.0;
/// Hours in 30 days, the COPD long-term exposure reference
const COPD_REFERENCE_HOURS: f64 = 720.0;

/// Exposure-to-risk scorer
pub struct ExposureScorer;

impl ExposureScorer {
    /// Score an exposure profile
    ///
    /// Negative or non-finite PM2.5 levels and unhealthy hours are rejected.
    pub fn score(profile: &ExposureProfile) -> Result<RiskScoreSet, PrepError> {
        check_magnitude("avg_pm25", profile.avg_pm25)?;
        check_magnitude("peak_pm25", profile.peak_pm25)?;
        check_magnitude("hours_unhealthy", profile.hours_unhealthy)?;

        let pm25 = profile.avg_pm25;
        let peak = profile.peak_pm25;
        let hours = profile.hours_unhealthy;

        let asthma_base = ((pm25 / ASTHMA_REFERENCE_PM25) * 50.0).min(100.0);
        let asthma_peak_factor = 1.0 + (peak / 100.0) * 0.5;
        let asthma = asthma_base * asthma_peak_factor;

        let copd = (pm25 / 50.0) * 40.0 + (hours / COPD_REFERENCE_HOURS) * 30.0;

        let cardiovascular = (pm25 / 40.0) * 35.0 + (peak / 150.0) * 40.0;

        let allergy = (pm25 / 30.0) * 30.0;

        Ok(RiskScoreSet {
            asthma_risk: bounded(asthma),
            copd_risk: bounded(copd),
            cardiovascular_risk: bounded(cardiovascular),
            allergy_risk: bounded(allergy),
        })
    }
}

fn check_magnitude(name: &str, value: f64) -> Result<(), PrepError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PrepError::InvalidArgument(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Clamp to [0, 100] and round to two decimals
fn bounded(score: f64) -> f64 {
    round2(score.clamp(0.0, 100.0))
}

/// Round to two decimals on the exact binary value, ties to even
///
/// `0.125` rounds to `0.12`; `2.675` is stored just below the tie and rounds
/// to `2.67`.
fn round2(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(avg: f64, peak: f64, hours: f64) -> ExposureProfile {
        ExposureProfile {
            avg_pm25: avg,
            peak_pm25: peak,
            hours_unhealthy: hours,
            duration_days: 5,
        }
    }

    #[test]
    fn test_reference_profile() {
        let scores = ExposureScorer::score(&profile(35.0, 50.0, 100.0)).unwrap();
        assert_eq!(
            scores,
            RiskScoreSet {
                asthma_risk: 62.5,
                copd_risk: 32.17,
                cardiovascular_risk: 43.96,
                allergy_risk: 35.0,
            }
        );
    }

    #[test]
    fn test_zero_exposure() {
        let scores = ExposureScorer::score(&profile(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(scores.asthma_risk, 0.0);
        assert_eq!(scores.copd_risk, 0.0);
        assert_eq!(scores.cardiovascular_risk, 0.0);
        assert_eq!(scores.allergy_risk, 0.0);
    }

    #[test]
    fn test_extreme_exposure_clamps_to_100() {
        let scores = ExposureScorer::score(&profile(10_000.0, 0.0, 0.0)).unwrap();
        assert_eq!(scores.asthma_risk, 100.0);
        assert_eq!(scores.copd_risk, 100.0);
        assert_eq!(scores.cardiovascular_risk, 100.0);
        assert_eq!(scores.allergy_risk, 100.0);

        let scores = ExposureScorer::score(&profile(1e9, 1e9, 1e9)).unwrap();
        for value in [
            scores.asthma_risk,
            scores.copd_risk,
            scores.cardiovascular_risk,
            scores.allergy_risk,
        ] {
            assert_eq!(value, 100.0);
        }
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        for avg in [0.0, 3.5, 12.0, 35.0, 55.4, 150.4, 500.0] {
            for peak in [0.0, 25.0, 100.0, 400.0] {
                for hours in [0.0, 24.0, 720.0, 5000.0] {
                    let s = ExposureScorer::score(&profile(avg, peak, hours)).unwrap();
                    for value in [s.asthma_risk, s.copd_risk, s.cardiovascular_risk, s.allergy_risk] {
                        assert!((0.0..=100.0).contains(&value), "{} out of range", value);
                    }
                }
            }
        }
    }

    #[test]
    fn test_peak_amplifies_asthma_only_through_factor() {
        let calm = ExposureScorer::score(&profile(20.0, 0.0, 0.0)).unwrap();
        let spiky = ExposureScorer::score(&profile(20.0, 100.0, 0.0)).unwrap();

        assert!(spiky.asthma_risk > calm.asthma_risk);
        assert_eq!(spiky.allergy_risk, calm.allergy_risk);
        assert_eq!(spiky.copd_risk, calm.copd_risk);
    }

    #[test]
    fn test_two_decimal_rounding_ties_to_even() {
        assert_eq!(ExposureScorer::score(&profile(0.125, 0.0, 0.0)).unwrap().allergy_risk, 0.12);
        assert_eq!(ExposureScorer::score(&profile(0.375, 0.0, 0.0)).unwrap().allergy_risk, 0.38);
        assert_eq!(ExposureScorer::score(&profile(2.675, 0.0, 0.0)).unwrap().allergy_risk, 2.67);
        assert_eq!(round2(10.125), 10.12);
        assert_eq!(round2(1.005), 1.0);
    }

    #[test]
    fn test_negative_hours_rejected() {
        let err = ExposureScorer::score(&profile(35.0, 50.0, -1.0)).unwrap_err();
        assert!(matches!(err, PrepError::InvalidArgument(_)));
    }

    #[test]
    fn test_negative_or_nan_pm25_rejected() {
        assert!(ExposureScorer::score(&profile(-0.5, 10.0, 0.0)).is_err());
        assert!(ExposureScorer::score(&profile(10.0, -3.0, 0.0)).is_err());
        assert!(ExposureScorer::score(&profile(f64::NAN, 10.0, 0.0)).is_err());
    }

    #[test]
    fn test_profile_from_json() {
        let json = r#"{"avg_pm25": 35, "peak_pm25": 50, "hours_unhealthy": 100, "duration_days": 5}"#;
        let parsed: ExposureProfile = serde_json::from_str(json).unwrap();
        let scores = ExposureScorer::score(&parsed).unwrap();
        assert_eq!(scores.copd_risk, 32.17);
    }
}
