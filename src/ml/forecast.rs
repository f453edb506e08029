//! Lagged-return forecaster and 7-day price projection
//!
//! Fits ordinary least squares on one-day returns against their own lags,
//! then walks the model forward seven trading days, compounding each
//! predicted return onto the running price. Fit on demand per request and
//! never persisted.

use crate::error::{Error, Result};
use crate::ml::pipeline::StandardScaler;
use crate::types::{ForecastStep, PriceRecord};
use ndarray::{Array1, Array2};

/// Return lags used as regression features, in column order.
pub const RETURN_LAGS: [usize; 5] = [1, 2, 3, 5, 10];

const PROJECTION_DAYS: u32 = 7;

/// Ordinary least squares via the normal equations.
#[derive(Debug, Clone)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let n = x.nrows();
        if n != y.len() {
            return Err(Error::Model(format!(
                "feature/target length mismatch: {} vs {}",
                n,
                y.len()
            )));
        }
        let p = x.ncols() + 1;
        if n < p {
            return Err(Error::Model(format!(
                "need at least {} rows to fit {} parameters, got {}",
                p,
                p,
                n
            )));
        }

        // Normal equations over the design matrix [1 | X].
        let mut xtx = Array2::<f64>::zeros((p, p));
        let mut xty = Array1::<f64>::zeros(p);
        for i in 0..n {
            let mut row = Vec::with_capacity(p);
            row.push(1.0);
            row.extend(x.row(i).iter().copied());
            for a in 0..p {
                xty[a] += row[a] * y[i];
                for b in 0..p {
                    xtx[[a, b]] += row[a] * row[b];
                }
            }
        }

        let beta = solve(xtx, xty)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta.slice(ndarray::s![1..]).to_owned(),
        })
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting; small fixed-size systems only.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot_row, col]].abs() < 1e-10 {
            return Err(Error::Model(
                "singular matrix in least-squares solve".into(),
            ));
        }
        if pivot_row != col {
            for k in 0..n {
                let tmp = a[[col, k]];
                a[[col, k]] = a[[pivot_row, k]];
                a[[pivot_row, k]] = tmp;
            }
            b.swap(col, pivot_row);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc -= a[[row, k]] * x[k];
        }
        x[row] = acc / a[[row, row]];
    }
    Ok(x)
}

/// Lag vector rolled forward during projection. Field names mirror the lag
/// horizons in [`RETURN_LAGS`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct LagState {
    lag_1: f64,
    lag_2: f64,
    lag_3: f64,
    lag_5: f64,
    lag_10: f64,
}

impl LagState {
    fn as_row(&self) -> [f64; 5] {
        [self.lag_1, self.lag_2, self.lag_3, self.lag_5, self.lag_10]
    }

    /// Each step feeds the predicted return in as lag_1 and shifts the rest
    /// one slot: lag_3's value seeds lag_5, lag_5's seeds lag_10, and the
    /// old lag_10 is dropped. There is no 4-lag slot, so the shift is not a
    /// true calendar roll; do not regularize it, every projection depends
    /// on this exact order.
    fn roll(&mut self, predicted: f64) {
        *self = Self {
            lag_1: predicted,
            lag_2: self.lag_1,
            lag_3: self.lag_2,
            lag_5: self.lag_3,
            lag_10: self.lag_5,
        };
    }
}

/// Seed the lag vector from the tail of the return series. Note lag_1 takes
/// the return at `n-2`, one day earlier than the latest observed return.
fn seed_lags(returns: &[f64]) -> Result<LagState> {
    let n = returns.len();
    let max_lag = RETURN_LAGS[RETURN_LAGS.len() - 1];
    // returns[0] is always NaN, so the deepest lag must land at index >= 1.
    if n < max_lag + 2 {
        return Err(Error::Model(format!(
            "need at least {} price rows to seed return lags, got {}",
            max_lag + 2,
            n
        )));
    }

    Ok(LagState {
        lag_1: returns[n - 1 - 1],
        lag_2: returns[n - 1 - 2],
        lag_3: returns[n - 1 - 3],
        lag_5: returns[n - 1 - 5],
        lag_10: returns[n - 1 - 10],
    })
}

fn one_day_returns(close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|t| {
            if t >= 1 {
                close[t] / close[t - 1] - 1.0
            } else {
                f64::NAN
            }
        })
        .collect()
}

fn sorted_adjusted_close(records: &[PriceRecord]) -> Vec<f64> {
    let mut rows: Vec<&PriceRecord> = records.iter().collect();
    rows.sort_by_key(|r| r.date);
    rows.iter().map(|r| r.adjusted_close).collect()
}

/// Scaler plus OLS over lagged one-day returns.
#[derive(Debug, Clone)]
pub struct ReturnForecaster {
    scaler: StandardScaler,
    model: LinearModel,
}

impl ReturnForecaster {
    /// Fit on the price history of one ticker.
    pub fn fit(records: &[PriceRecord]) -> Result<Self> {
        let close = sorted_adjusted_close(records);
        let returns = one_day_returns(&close);
        let n = returns.len();
        let max_lag = RETURN_LAGS[RETURN_LAGS.len() - 1];

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for t in (max_lag + 1)..n {
            let row: Vec<f64> = RETURN_LAGS.iter().map(|&k| returns[t - k]).collect();
            if row.iter().all(|v| v.is_finite()) && returns[t].is_finite() {
                rows.extend(row);
                targets.push(returns[t]);
            }
        }

        let n_rows = targets.len();
        if n_rows <= RETURN_LAGS.len() {
            let ticker = records.first().map(|r| r.ticker.as_str()).unwrap_or("?");
            return Err(Error::insufficient(ticker, records.len()));
        }

        let x = Array2::from_shape_vec((n_rows, RETURN_LAGS.len()), rows)
            .expect("row-major lag layout");
        let y = Array1::from_vec(targets);

        let scaler = StandardScaler::fit(&x);
        let model = LinearModel::fit(&scaler.transform(&x), &y)?;

        Ok(Self { scaler, model })
    }

    /// Walk the fitted model 7 trading days forward from the last close.
    pub fn project(&self, records: &[PriceRecord]) -> Result<Vec<ForecastStep>> {
        let close = sorted_adjusted_close(records);
        let returns = one_day_returns(&close);

        let mut lags = seed_lags(&returns)?;
        let mut price = *close.last().ok_or_else(|| Error::Model("empty history".into()))?;

        let mut steps = Vec::with_capacity(PROJECTION_DAYS as usize);
        for d in 1..=PROJECTION_DAYS {
            let row = lags.as_row();
            let x = Array2::from_shape_vec((1, RETURN_LAGS.len()), row.to_vec())
                .expect("single lag row");
            let scaled = self.scaler.transform(&x);
            let ret_pred = self.model.predict_one(scaled.row(0).as_slice().unwrap_or(&row));

            price *= 1.0 + ret_pred;
            steps.push(ForecastStep {
                d_plus: d,
                ret_pred,
                close_pred: price,
            });

            lags.roll(ret_pred);
        }

        Ok(steps)
    }

    /// Fit and project in one call, the shape read paths use.
    pub fn fit_project(records: &[PriceRecord]) -> Result<Vec<ForecastStep>> {
        Self::fit(records)?.project(records)
    }
}
