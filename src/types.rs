//! Core data types shared across the crate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One daily price row for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Raw closing price, used for history views and trailing returns.
    pub close: f64,
    /// Split/dividend adjusted close, the canonical modeling series.
    pub adjusted_close: f64,
    pub volume: f64,
}

/// Metadata row for the latest trained artifact of one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModelRecord {
    pub ticker: String,
    /// Version label, `YYYYMMDD` by default.
    pub version: String,
    pub artifact_path: String,
    /// Evaluation metrics as JSON text (accuracy, f1, roc_auc, report).
    pub metrics: String,
    pub trained_at: DateTime<Utc>,
}

/// One step of the 7-day price projection. Produced transiently, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    /// Trading-day offset from the last known close, 1..=7.
    pub d_plus: u32,
    pub ret_pred: f64,
    pub close_pred: f64,
}

/// `{date, close}` pair in the detail view history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Next-day direction call from the latest classifier. All fields are null
/// when no artifact exists or recent history is too short to build features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationView {
    pub pred_up: Option<i32>,
    pub prob_up: Option<f64>,
    pub model_metrics: serde_json::Value,
}

/// Detail view for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDetail {
    pub ticker: String,
    pub history_30d: Vec<HistoryPoint>,
    pub classification_d1: ClassificationView,
    pub projection_7d: Vec<ForecastStep>,
}

/// One row of the top-movers ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopGainer {
    pub ticker: String,
    /// 30-day trailing return on raw close.
    pub var_30d: f64,
    pub price_now: f64,
    pub pred_up_d1: Option<f64>,
    pub model_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopGainersResponse {
    pub top5: Vec<TopGainer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub rows_refreshed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainRequest {
    pub ticker: Option<String>,
    pub version: Option<String>,
}

/// Per-ticker outcome in a batch training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TickerTrainStatus {
    Ok {
        metrics: serde_json::Value,
        artifact_path: String,
    },
    Error {
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_status_serializes_with_tag() {
        let ok = TickerTrainStatus::Ok {
            metrics: serde_json::json!({"accuracy": 0.6}),
            artifact_path: "artifacts/PETR4_20240101.json".into(),
        };
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["metrics"]["accuracy"], 0.6);

        let err = TickerTrainStatus::Error {
            error: "insufficient data".into(),
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["status"], "error");
    }

    #[test]
    fn test_classification_view_null_fields() {
        let view = ClassificationView {
            pred_up: None,
            prob_up: None,
            model_metrics: serde_json::Value::Object(Default::default()),
        };
        let v = serde_json::to_value(&view).unwrap();
        assert!(v["pred_up"].is_null());
        assert!(v["prob_up"].is_null());
    }
}
