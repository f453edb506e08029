//! Binary logistic regression fit by gradient descent
//!
//! Small and dependency-light on purpose: the direction problem has eleven
//! features and a few hundred rows per ticker, so batch gradient descent with
//! an L2 penalty converges quickly and serializes as plain coefficients.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
    learning_rate: f64,
    max_iter: usize,
    tolerance: f64,
    /// L2 penalty weight. The intercept is never penalized.
    l2: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LogisticRegression {
    pub fn new(l2: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            learning_rate: 0.1,
            max_iter: 1000,
            tolerance: 1e-6,
            l2,
        }
    }

    /// Numerically stable sigmoid.
    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let e = z.exp();
            e / (1.0 + e)
        }
    }

    fn log_loss(y: &Array1<f64>, p: &Array1<f64>) -> f64 {
        let eps = 1e-15;
        let n = y.len() as f64;
        -y.iter()
            .zip(p.iter())
            .map(|(&t, &q)| {
                let q = q.clamp(eps, 1.0 - eps);
                t * q.ln() + (1.0 - t) * (1.0 - q).ln()
            })
            .sum::<f64>()
            / n
    }

    /// Fit on rows of `x` against labels in {0, 1}.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(Error::Model("cannot fit classifier on 0 rows".into()));
        }
        if x.nrows() != y.len() {
            return Err(Error::Model(format!(
                "feature/label length mismatch: {} vs {}",
                x.nrows(),
                y.len()
            )));
        }

        let n = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        let mut prev_cost = f64::INFINITY;

        for _ in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = linear.mapv(Self::sigmoid);

            let errors = &predictions - y;
            let mut dw = x.t().dot(&errors) / n;
            let db = errors.sum() / n;

            if self.l2 > 0.0 {
                dw = &dw + &(&weights * (self.l2 / n));
            }

            weights = &weights - &(&dw * self.learning_rate);
            bias -= self.learning_rate * db;

            let cost = Self::log_loss(y, &predictions);
            if (prev_cost - cost).abs() < self.tolerance {
                break;
            }
            prev_cost = cost;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(())
    }

    /// Probability of class 1 for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self
            .coefficients
            .as_ref()
            .ok_or_else(|| Error::Model("classifier not fitted".into()))?;
        let bias = self
            .intercept
            .ok_or_else(|| Error::Model("classifier not fitted".into()))?;

        if x.ncols() != weights.len() {
            return Err(Error::Model(format!(
                "expected {} features, got {}",
                weights.len(),
                x.ncols()
            )));
        }

        Ok((x.dot(weights) + bias).mapv(Self::sigmoid))
    }

    /// Class labels at the 0.5 threshold.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}
