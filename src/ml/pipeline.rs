//! Preprocessing plus classifier, fit and applied as one unit
//!
//! Numeric columns are standardized, the weekday column is one-hot encoded
//! over the categories seen at fit time, and the encoded design matrix feeds
//! the logistic classifier. The whole pipeline is serde data so it can be
//! written to and restored from a JSON artifact unchanged.

use crate::error::{Error, Result};
use crate::ml::classifier::LogisticRegression;
use crate::ml::features::WEEKDAY_COLUMN;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization. Zero-variance columns scale by 1.0, which
/// keeps constant features harmless instead of producing NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let means: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| col.sum() / n)
            .collect();
        let stds: Vec<f64> = x
            .axis_iter(Axis(1))
            .zip(means.iter())
            .map(|(col, &mean)| {
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > 0.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, stds }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (mut col, (&mean, &std)) in out
            .axis_iter_mut(Axis(1))
            .zip(self.means.iter().zip(self.stds.iter()))
        {
            col.mapv_inplace(|v| (v - mean) / std);
        }
        out
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

/// One-hot encoding of the weekday column. Categories are the distinct
/// weekdays seen during fitting; a weekday never seen at fit time encodes as
/// all zeros rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayEncoder {
    categories: Vec<u32>,
}

impl WeekdayEncoder {
    pub fn fit(column: ArrayView1<f64>) -> Self {
        let mut categories: Vec<u32> = column.iter().map(|&v| v as u32).collect();
        categories.sort_unstable();
        categories.dedup();
        Self { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn encode(&self, weekday: f64) -> Vec<f64> {
        let wd = weekday as u32;
        self.categories
            .iter()
            .map(|&c| if c == wd { 1.0 } else { 0.0 })
            .collect()
    }
}

/// The fitted direction pipeline persisted inside an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionPipeline {
    scaler: StandardScaler,
    encoder: WeekdayEncoder,
    model: LogisticRegression,
}

impl DirectionPipeline {
    /// Fit on a raw feature matrix laid out as in
    /// [`crate::ml::features::FEATURE_COLUMNS`] (weekday last).
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::Model("cannot fit pipeline on 0 rows".into()));
        }

        let numeric = x.slice(ndarray::s![.., ..WEEKDAY_COLUMN]).to_owned();
        let weekday = x.column(WEEKDAY_COLUMN);

        let scaler = StandardScaler::fit(&numeric);
        let encoder = WeekdayEncoder::fit(weekday);

        let design = Self::design_matrix(&scaler, &encoder, x);
        let mut model = LogisticRegression::default();
        model.fit(&design, y)?;

        Ok(Self {
            scaler,
            encoder,
            model,
        })
    }

    fn design_matrix(
        scaler: &StandardScaler,
        encoder: &WeekdayEncoder,
        x: &Array2<f64>,
    ) -> Array2<f64> {
        let numeric = x.slice(ndarray::s![.., ..WEEKDAY_COLUMN]).to_owned();
        let scaled = scaler.transform(&numeric);

        let width = scaler.n_features() + encoder.width();
        let mut design = Array2::zeros((x.nrows(), width));
        for i in 0..x.nrows() {
            for j in 0..scaler.n_features() {
                design[[i, j]] = scaled[[i, j]];
            }
            for (k, v) in encoder.encode(x[[i, WEEKDAY_COLUMN]]).into_iter().enumerate() {
                design[[i, scaler.n_features() + k]] = v;
            }
        }
        design
    }

    /// Probability of an up move for each raw feature row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != WEEKDAY_COLUMN + 1 {
            return Err(Error::Model(format!(
                "expected {} raw feature columns, got {}",
                WEEKDAY_COLUMN + 1,
                x.ncols()
            )));
        }
        let design = Self::design_matrix(&self.scaler, &self.encoder, x);
        self.model.predict_proba(&design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::FEATURE_COLUMNS;

    fn toy_table(n: usize) -> (Array2<f64>, Array1<f64>) {
        // Feature 0 separates the classes; weekday cycles Mon..Fri.
        let mut x = Array2::zeros((n, FEATURE_COLUMNS.len()));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let up = i % 2 == 0;
            x[[i, 0]] = if up { 0.02 } else { -0.02 };
            for j in 1..WEEKDAY_COLUMN {
                x[[i, j]] = 1.0 + (i as f64 * 0.01);
            }
            x[[i, WEEKDAY_COLUMN]] = (i % 5) as f64;
            y[i] = if up { 1.0 } else { 0.0 };
        }
        (x, y)
    }

    #[test]
    fn test_scaler_zero_variance_guard() {
        let x = Array2::from_shape_vec((3, 2), vec![5.0, 1.0, 5.0, 2.0, 5.0, 3.0]).unwrap();
        let scaler = StandardScaler::fit(&x);
        let out = scaler.transform(&x);

        // Constant column maps to 0, never NaN.
        assert!(out.column(0).iter().all(|&v| v == 0.0));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_encoder_unknown_weekday_all_zero() {
        let col = Array1::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let encoder = WeekdayEncoder::fit(col.view());

        assert_eq!(encoder.width(), 5);
        assert_eq!(encoder.encode(2.0), vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        // Saturday was never seen: all-zero encoding, not an error.
        assert_eq!(encoder.encode(5.0), vec![0.0; 5]);
    }

    #[test]
    fn test_pipeline_learns_separable_direction() {
        let (x, y) = toy_table(60);
        let pipeline = DirectionPipeline::fit(&x, &y).unwrap();

        let proba = pipeline.predict_proba(&x).unwrap();
        let correct = proba
            .iter()
            .zip(y.iter())
            .filter(|(&p, &t)| (p >= 0.5) == (t == 1.0))
            .count();
        assert!(correct as f64 / 60.0 > 0.9);
    }

    #[test]
    fn test_pipeline_survives_constant_features() {
        let mut x = Array2::zeros((40, FEATURE_COLUMNS.len()));
        for i in 0..40 {
            x[[i, WEEKDAY_COLUMN]] = (i % 5) as f64;
        }
        let y = Array1::zeros(40);

        let pipeline = DirectionPipeline::fit(&x, &y).unwrap();
        let proba = pipeline.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_pipeline_serde_round_trip() {
        let (x, y) = toy_table(40);
        let pipeline = DirectionPipeline::fit(&x, &y).unwrap();

        let json = serde_json::to_string(&pipeline).unwrap();
        let restored: DirectionPipeline = serde_json::from_str(&json).unwrap();

        let a = pipeline.predict_proba(&x).unwrap();
        let b = restored.predict_proba(&x).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wrong_column_count_errors() {
        let (x, y) = toy_table(40);
        let pipeline = DirectionPipeline::fit(&x, &y).unwrap();
        let wrong = Array2::zeros((1, 4));
        assert!(pipeline.predict_proba(&wrong).is_err());
    }
}
