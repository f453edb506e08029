//! Feature engineering for next-day direction models
//!
//! Turns a date-sorted run of daily price rows for one ticker into a lagged
//! feature matrix plus a binary next-day-up label. Every feature column is
//! shifted forward one day relative to the label, so each row's features are
//! knowable strictly before the labeled day's open. Rows with incomplete
//! history come out as NaN and are dropped, mirroring a rolling-window table.

use crate::types::PriceRecord;
use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};

/// Ordered feature columns, weekday last.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "ret_1",
    "ret_5",
    "ret_10",
    "vol_5",
    "vol_10",
    "sma_5",
    "sma_10",
    "sma_20",
    "sma_5_vs_20",
    "stoch_k",
    "weekday",
];

/// Index of the categorical weekday column within [`FEATURE_COLUMNS`].
pub const WEEKDAY_COLUMN: usize = 10;

/// Stochastic oscillator lookback.
const STOCH_WINDOW: usize = 14;

/// Feature matrix for one ticker. Row `i` is labeled by the close of
/// `dates[i]` against the close of the following trading day.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub dates: Vec<NaiveDate>,
    /// Shape `(rows, FEATURE_COLUMNS.len())`.
    pub x: Array2<f64>,
    /// Binary labels: 1.0 when the next day closed higher.
    pub y: Array1<f64>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn empty() -> Self {
        Self {
            dates: Vec::new(),
            x: Array2::zeros((0, FEATURE_COLUMNS.len())),
            y: Array1::zeros(0),
        }
    }
}

/// Percentage change over a `k`-day horizon. The first `k` slots are NaN.
fn pct_change(series: &[f64], k: usize) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t >= k {
                series[t] / series[t - k] - 1.0
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Rolling sample standard deviation (ddof = 1) over a `w`-day window.
fn rolling_std(series: &[f64], w: usize) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t + 1 < w {
                return f64::NAN;
            }
            let window = &series[t + 1 - w..=t];
            let mean = window.iter().sum::<f64>() / w as f64;
            let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w - 1) as f64;
            var.sqrt()
        })
        .collect()
}

/// Rolling mean over a `w`-day window.
fn rolling_mean(series: &[f64], w: usize) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t + 1 < w {
                return f64::NAN;
            }
            series[t + 1 - w..=t].iter().sum::<f64>() / w as f64
        })
        .collect()
}

fn rolling_min(series: &[f64], w: usize) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t + 1 < w {
                return f64::NAN;
            }
            series[t + 1 - w..=t].iter().copied().fold(f64::INFINITY, f64::min)
        })
        .collect()
}

fn rolling_max(series: &[f64], w: usize) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t + 1 < w {
                return f64::NAN;
            }
            series[t + 1 - w..=t]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

/// Shift a column forward one day: row `t` takes the value computed at `t-1`.
fn shift_one(column: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(column.len());
    out.push(f64::NAN);
    out.extend_from_slice(&column[..column.len().saturating_sub(1)]);
    out
}

/// Build the lagged feature table and labels for one ticker.
///
/// Needs roughly 21 usable rows (the 20-day rolling window plus the one-day
/// label lookahead) before anything survives the NaN drop; shorter histories
/// produce an empty table, which callers treat as "insufficient history".
pub fn build_features(records: &[PriceRecord]) -> FeatureTable {
    if records.is_empty() {
        return FeatureTable::empty();
    }

    let mut rows: Vec<&PriceRecord> = records.iter().collect();
    rows.sort_by_key(|r| r.date);

    let n = rows.len();
    let close: Vec<f64> = rows.iter().map(|r| r.adjusted_close).collect();
    let high: Vec<f64> = rows.iter().map(|r| r.high).collect();
    let low: Vec<f64> = rows.iter().map(|r| r.low).collect();
    let volume: Vec<f64> = rows.iter().map(|r| r.volume).collect();

    let sma_5 = rolling_mean(&close, 5);
    let sma_10 = rolling_mean(&close, 10);
    let sma_20 = rolling_mean(&close, 20);
    let sma_ratio: Vec<f64> = sma_5
        .iter()
        .zip(sma_20.iter())
        .map(|(a, b)| a / b)
        .collect();

    let low_14 = rolling_min(&low, STOCH_WINDOW);
    let high_14 = rolling_max(&high, STOCH_WINDOW);
    let stoch_k: Vec<f64> = (0..n)
        .map(|t| {
            let range = high_14[t] - low_14[t];
            if range == 0.0 {
                f64::NAN
            } else {
                (close[t] - low_14[t]) / range
            }
        })
        .collect();

    let weekday: Vec<f64> = rows
        .iter()
        .map(|r| r.date.weekday().num_days_from_monday() as f64)
        .collect();

    // The final row's label needs tomorrow's close and stays NaN.
    let label: Vec<f64> = (0..n)
        .map(|t| {
            if t + 1 < n {
                if close[t + 1] / close[t] - 1.0 > 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                f64::NAN
            }
        })
        .collect();

    let raw_columns: [Vec<f64>; 11] = [
        pct_change(&close, 1),
        pct_change(&close, 5),
        pct_change(&close, 10),
        rolling_std(&volume, 5),
        rolling_std(&volume, 10),
        sma_5,
        sma_10,
        sma_20,
        sma_ratio,
        stoch_k,
        weekday,
    ];
    let shifted: Vec<Vec<f64>> = raw_columns.iter().map(|c| shift_one(c)).collect();

    let mut dates = Vec::new();
    let mut flat = Vec::new();
    let mut labels = Vec::new();

    for t in 0..n {
        let row: Vec<f64> = shifted.iter().map(|c| c[t]).collect();
        if label[t].is_finite() && row.iter().all(|v| v.is_finite()) {
            dates.push(rows[t].date);
            flat.extend(row);
            labels.push(label[t]);
        }
    }

    if dates.is_empty() {
        return FeatureTable::empty();
    }

    let x = Array2::from_shape_vec((dates.len(), FEATURE_COLUMNS.len()), flat)
        .expect("row-major feature layout");
    FeatureTable {
        dates,
        x,
        y: Array1::from_vec(labels),
    }
}
