//! Lookback/horizon sequence windowing
//!
//! Turns per-entity, time-ordered, normalized feature matrices into supervised
//! training pairs for multi-step forecasting. Windows never cross entity
//! boundaries; entities too short for a single window are skipped and reported.

use crate::error::PrepError;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Normalized feature matrix for one entity, rows in time order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    pub entity_id: String,
    pub rows: Vec<Vec<f64>>,
}

/// One supervised training pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub entity_id: String,
    /// Row offset of the first lookback step within the entity series
    pub start: usize,
    /// `lookback` rows of every feature column
    pub features: Vec<Vec<f64>>,
    /// `horizon` future values of the target column
    pub label: Vec<f64>,
}

/// Entity that contributed no windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub entity_id: String,
    pub rows: usize,
}

/// Windows produced from a batch of entity series
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSet {
    pub windows: Vec<Window>,
    pub skipped: Vec<SkippedEntity>,
}

/// Fixed-shape arrays handed to the sequence model
#[derive(Debug, Clone)]
pub struct ForecastArrays {
    /// Shape (windows, lookback, features)
    pub x: Array3<f64>,
    /// Shape (windows, horizon)
    pub y: Array2<f64>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Fail when no entity had enough history for a single window
    pub fn ensure_not_empty(&self) -> Result<(), PrepError> {
        if self.windows.is_empty() {
            return Err(PrepError::InsufficientData(format!(
                "no training windows produced ({} entities skipped)",
                self.skipped.len()
            )));
        }
        Ok(())
    }

    /// Stack windows into model-ready arrays
    pub fn to_arrays(&self) -> Result<ForecastArrays, PrepError> {
        self.ensure_not_empty()?;

        let first = &self.windows[0];
        let lookback = first.features.len();
        let width = first.features.first().map(|r| r.len()).unwrap_or(0);
        let horizon = first.label.len();

        let mut x = Vec::with_capacity(self.windows.len() * lookback * width);
        let mut y = Vec::with_capacity(self.windows.len() * horizon);
        for window in &self.windows {
            for row in &window.features {
                x.extend_from_slice(row);
            }
            y.extend_from_slice(&window.label);
        }

        let x = Array3::from_shape_vec((self.windows.len(), lookback, width), x)
            .map_err(|e| PrepError::ShapeMismatch(e.to_string()))?;
        let y = Array2::from_shape_vec((self.windows.len(), horizon), y)
            .map_err(|e| PrepError::ShapeMismatch(e.to_string()))?;

        Ok(ForecastArrays { x, y })
    }
}

/// Windowing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindower {
    lookback: usize,
    horizon: usize,
    target_index: usize,
}

impl SequenceWindower {
    /// Create a windower; lookback and horizon must be at least 1
    pub fn new(lookback: usize, horizon: usize, target_index: usize) -> Result<Self, PrepError> {
        if lookback == 0 || horizon == 0 {
            return Err(PrepError::InvalidArgument(format!(
                "lookback and horizon must be positive (got {} and {})",
                lookback, horizon
            )));
        }
        Ok(Self {
            lookback,
            horizon,
            target_index,
        })
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    /// Minimum series length for one window
    pub fn span(&self) -> usize {
        self.lookback + self.horizon
    }

    /// Window every series independently
    pub fn window(&self, series: &[NormalizedSeries]) -> Result<WindowSet, PrepError> {
        let mut set = WindowSet::default();

        for entity in series {
            self.check_rows(entity)?;

            let n = entity.rows.len();
            if n < self.span() {
                log::warn!(
                    "Skipping entity {}: {} rows, need {}",
                    entity.entity_id,
                    n,
                    self.span()
                );
                set.skipped.push(SkippedEntity {
                    entity_id: entity.entity_id.clone(),
                    rows: n,
                });
                continue;
            }

            for start in 0..=(n - self.span()) {
                set.windows.push(self.window_at(entity, start));
            }
        }

        log::debug!(
            "Produced {} windows from {} entities ({} skipped)",
            set.windows.len(),
            series.len(),
            set.skipped.len()
        );

        Ok(set)
    }

    fn window_at(&self, entity: &NormalizedSeries, start: usize) -> Window {
        let split = start + self.lookback;
        Window {
            entity_id: entity.entity_id.clone(),
            start,
            features: entity.rows[start..split].to_vec(),
            label: entity.rows[split..split + self.horizon]
                .iter()
                .map(|row| row[self.target_index])
                .collect(),
        }
    }

    fn check_rows(&self, entity: &NormalizedSeries) -> Result<(), PrepError> {
        let Some(width) = entity.rows.first().map(|r| r.len()) else {
            return Ok(());
        };

        if self.target_index >= width {
            return Err(PrepError::InvalidArgument(format!(
                "target index {} out of range for {} features",
                self.target_index, width
            )));
        }

        if let Some(idx) = entity.rows.iter().position(|r| r.len() != width) {
            return Err(PrepError::ShapeMismatch(format!(
                "entity {} row {} has {} values, expected {}",
                entity.entity_id,
                idx,
                entity.rows[idx].len(),
                width
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Rows where column 0 is the step index and column 1 is a marker per entity
    fn series(entity_id: &str, len: usize, marker: f64) -> NormalizedSeries {
        NormalizedSeries {
            entity_id: entity_id.to_string(),
            rows: (0..len).map(|i| vec![i as f64, marker]).collect(),
        }
    }

    #[test]
    fn test_window_shapes() {
        let windower = SequenceWindower::new(4, 2, 0).unwrap();
        let set = windower.window(&[series("a", 10, 1.0)]).unwrap();

        assert_eq!(set.len(), 5);
        for window in &set.windows {
            assert_eq!(window.features.len(), 4);
            assert_eq!(window.label.len(), 2);
        }
    }

    #[test]
    fn test_window_contents() {
        let windower = SequenceWindower::new(3, 2, 0).unwrap();
        let set = windower.window(&[series("a", 6, 1.0)]).unwrap();

        let second = &set.windows[1];
        assert_eq!(second.start, 1);
        assert_eq!(
            second.features,
            vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![3.0, 1.0]]
        );
        assert_eq!(second.label, vec![4.0, 5.0]);
    }

    #[test]
    fn test_label_uses_target_column() {
        let windower = SequenceWindower::new(2, 1, 1).unwrap();
        let set = windower.window(&[series("a", 3, 7.0)]).unwrap();
        assert_eq!(set.windows[0].label, vec![7.0]);
    }

    #[test]
    fn test_exact_span_yields_one_window() {
        let windower = SequenceWindower::new(24, 24, 0).unwrap();

        let set = windower.window(&[series("a", 48, 1.0)]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.skipped.is_empty());

        let set = windower.window(&[series("a", 47, 1.0)]).unwrap();
        assert_eq!(set.len(), 0);
        assert_eq!(
            set.skipped,
            vec![SkippedEntity {
                entity_id: "a".to_string(),
                rows: 47
            }]
        );
    }

    #[test]
    fn test_windows_never_span_entities() {
        let windower = SequenceWindower::new(3, 2, 0).unwrap();
        let set = windower
            .window(&[series("a", 7, 1.0), series("b", 6, 2.0)])
            .unwrap();

        assert_eq!(set.len(), 3 + 2);
        for window in &set.windows {
            let marker = if window.entity_id == "a" { 1.0 } else { 2.0 };
            assert!(window.features.iter().all(|row| row[1] == marker));
        }
    }

    #[test]
    fn test_short_entity_skipped_others_kept() {
        let windower = SequenceWindower::new(3, 2, 0).unwrap();
        let set = windower
            .window(&[series("short", 2, 1.0), series("long", 5, 2.0)])
            .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].entity_id, "short");
    }

    #[test]
    fn test_all_skipped_is_insufficient_data() {
        let windower = SequenceWindower::new(3, 2, 0).unwrap();
        let set = windower.window(&[series("a", 2, 1.0)]).unwrap();
        assert!(matches!(
            set.ensure_not_empty(),
            Err(PrepError::InsufficientData(_))
        ));
        assert!(set.to_arrays().is_err());
    }

    #[test]
    fn test_to_arrays_shape() {
        let windower = SequenceWindower::new(3, 2, 0).unwrap();
        let set = windower.window(&[series("a", 8, 1.0)]).unwrap();
        let arrays = set.to_arrays().unwrap();

        assert_eq!(arrays.x.shape(), &[4, 3, 2]);
        assert_eq!(arrays.y.shape(), &[4, 2]);
        assert_eq!(arrays.x[[2, 0, 0]], 2.0);
        assert_eq!(arrays.y[[3, 1]], 7.0);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(SequenceWindower::new(0, 24, 0).is_err());
        assert!(SequenceWindower::new(24, 0, 0).is_err());

        let windower = SequenceWindower::new(2, 1, 5).unwrap();
        assert!(windower.window(&[series("a", 4, 1.0)]).is_err());
    }
}
