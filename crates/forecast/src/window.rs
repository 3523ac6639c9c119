//! Normalized model input windows.

use ndarray::{Array2, ArrayView1, ArrayView3, Axis, s};

use crate::features::{FEATURE_COUNT, Feature, FeatureVector};

/// Timesteps per window.
pub const WINDOW_SIZE: usize = 30;

/// A `WINDOW_SIZE x FEATURE_COUNT` block of normalized features, oldest row first.
///
/// Windows are never mutated in place: sliding or overlaying produces a new
/// window, so a snapshot handed to the model cannot change underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastWindow {
    data: Array2<f64>,
}

impl ForecastWindow {
    /// Build a window from the most recent `WINDOW_SIZE` rows, repeating the
    /// last row when fewer are supplied. `None` when `rows` is empty.
    pub fn padded(rows: &[FeatureVector]) -> Option<Self> {
        let last = rows.last()?;
        let start = rows.len().saturating_sub(WINDOW_SIZE);
        let tail = &rows[start..];
        let data = Array2::from_shape_fn((WINDOW_SIZE, FEATURE_COUNT), |(t, f)| {
            tail.get(t).unwrap_or(last).as_slice()[f]
        });
        Some(Self { data })
    }

    /// Batch shape as seen by the model: `(1, WINDOW_SIZE, FEATURE_COUNT)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        let (t, f) = self.data.dim();
        (1, t, f)
    }

    pub fn batch(&self) -> ArrayView3<'_, f64> {
        self.data.view().insert_axis(Axis(0))
    }

    pub fn row(&self, t: usize) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, v) in values.iter_mut().zip(self.data.row(t)) {
            *slot = *v;
        }
        FeatureVector::new(values)
    }

    pub fn last_row(&self) -> FeatureVector {
        self.row(WINDOW_SIZE - 1)
    }

    pub fn aqi_column(&self) -> Vec<f64> {
        self.data.column(Feature::Aqi.index()).to_vec()
    }

    /// Drop the oldest row and append `row` as the newest.
    pub fn slide(&self, row: &FeatureVector) -> Self {
        let mut data = Array2::zeros((WINDOW_SIZE, FEATURE_COUNT));
        data.slice_mut(s![..WINDOW_SIZE - 1, ..])
            .assign(&self.data.slice(s![1.., ..]));
        data.row_mut(WINDOW_SIZE - 1)
            .assign(&ArrayView1::from(row.as_slice()));
        Self { data }
    }

    /// Replace the newest `k` rows with `row`.
    pub fn with_tail(&self, row: &FeatureVector, k: usize) -> Self {
        let mut data = self.data.clone();
        let k = k.min(WINDOW_SIZE);
        for t in WINDOW_SIZE - k..WINDOW_SIZE {
            data.row_mut(t).assign(&ArrayView1::from(row.as_slice()));
        }
        Self { data }
    }
}
