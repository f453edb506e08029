//! Market data refresh and prediction read paths
//!
//! Glue between storage, the chart client and the fitted models. The detail
//! view degrades instead of failing: a missing artifact or short recent
//! history yields null prediction fields, and a projection that cannot be
//! fitted is reported inline rather than as an error status.

use crate::client::{storage_ticker, YahooClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ml::{build_features, load_artifact, ReturnForecaster, TrainedArtifact};
use crate::storage::Database;
use crate::types::{
    ClassificationView, HistoryPoint, PriceRecord, RefreshOutcome, StockDetail, TopGainer,
    TopGainersResponse,
};
use chrono::{Duration, Utc};
use ndarray::s;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Rows of recent history pulled for the detail view and projections.
const DETAIL_WINDOW: u32 = 180;
/// Trailing trading days for the top-movers return.
const GAINER_WINDOW: usize = 30;

pub struct MarketService {
    db: Arc<Database>,
    client: YahooClient,
    config: Arc<Config>,
}

impl MarketService {
    pub fn new(db: Arc<Database>, client: YahooClient, config: Arc<Config>) -> Self {
        Self { db, client, config }
    }

    /// Refresh the full price snapshot from the chart API.
    ///
    /// Symbols that fail to download are logged and skipped; the snapshot is
    /// replaced in one transaction with whatever did arrive. A refresh where
    /// nothing arrived reports zero rows and leaves the stored snapshot alone.
    pub async fn update_market(&self) -> Result<RefreshOutcome> {
        let end = Utc::now();
        let start = end - Duration::days(self.config.market_data.history_days);

        let mut all_rows: Vec<PriceRecord> = Vec::new();
        for symbol in &self.config.market_data.tickers {
            match self.client.daily_history(symbol, start, end).await {
                Ok(rows) => all_rows.extend(rows),
                Err(e) => warn!(%symbol, error = %e, "skipping symbol in refresh"),
            }
        }

        if all_rows.is_empty() {
            warn!("refresh fetched no rows, keeping previous snapshot");
            return Ok(RefreshOutcome { rows_refreshed: 0 });
        }

        let rows_refreshed = self.db.replace_prices(&all_rows).await?;
        info!(rows_refreshed, "market snapshot replaced");
        Ok(RefreshOutcome { rows_refreshed })
    }

    /// Detail view for one ticker: recent history, next-day direction call
    /// from the latest artifact, and an on-demand 7-day projection.
    pub async fn stock_detail(&self, ticker: &str) -> Result<StockDetail> {
        let ticker = storage_ticker(ticker);
        let rows = self.db.last_n_prices(ticker, DETAIL_WINDOW).await?;
        if rows.is_empty() {
            return Err(Error::NoData(format!("no price history for {ticker}")));
        }

        let history_30d = rows
            .iter()
            .rev()
            .take(GAINER_WINDOW)
            .rev()
            .map(|r| HistoryPoint {
                date: r.date,
                close: r.close,
            })
            .collect();

        let mut classification = self.classify(ticker, &rows).await?;

        let projection_7d = match ReturnForecaster::fit_project(&rows) {
            Ok(steps) => steps,
            Err(e) => {
                warn!(ticker, error = %e, "projection failed");
                if let serde_json::Value::Object(map) = &mut classification.model_metrics {
                    map.insert(
                        "projection_error".to_string(),
                        serde_json::Value::String(e.to_string()),
                    );
                }
                Vec::new()
            }
        };

        Ok(StockDetail {
            ticker: ticker.to_string(),
            history_30d,
            classification_d1: classification,
            projection_7d,
        })
    }

    /// Direction call from the latest artifact, or all-null when no usable
    /// artifact or feature row exists.
    async fn classify(&self, ticker: &str, rows: &[PriceRecord]) -> Result<ClassificationView> {
        let empty = ClassificationView {
            pred_up: None,
            prob_up: None,
            model_metrics: serde_json::Value::Object(Default::default()),
        };

        let Some(record) = self.db.latest_model(ticker).await? else {
            return Ok(empty);
        };

        // A stale metadata row pointing at a deleted artifact degrades the
        // same way as having no model.
        let artifact = match load_artifact(Path::new(&record.artifact_path)) {
            Ok(a) => a,
            Err(e) => {
                warn!(ticker, error = %e, "artifact unreadable, degrading to null");
                return Ok(empty);
            }
        };

        let model_metrics = serde_json::from_str(&record.metrics)
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let (pred_up, prob_up) = match latest_probability(&artifact, rows)? {
            Some(p) => (Some(i32::from(p >= 0.5)), Some(p)),
            None => (None, None),
        };

        Ok(ClassificationView {
            pred_up,
            prob_up,
            model_metrics,
        })
    }

    /// Top five tickers by trailing 30-day return on raw close, annotated
    /// with the latest model's call where one exists.
    pub async fn top_gainers(&self) -> Result<TopGainersResponse> {
        let tickers = self.db.list_tickers().await?;

        let mut gainers = Vec::new();
        for ticker in tickers {
            let rows = self
                .db
                .last_n_prices(&ticker, (GAINER_WINDOW + 10) as u32)
                .await?;
            if rows.len() < GAINER_WINDOW + 1 {
                continue;
            }

            let last = rows[rows.len() - 1].close;
            let base = rows[rows.len() - 1 - GAINER_WINDOW].close;
            let var_30d = last / base - 1.0;

            let (pred_up_d1, model_accuracy) = match self.db.latest_model(&ticker).await? {
                Some(record) => {
                    let accuracy = serde_json::from_str::<serde_json::Value>(&record.metrics)
                        .ok()
                        .and_then(|m| m["accuracy"].as_f64());
                    let prob = match load_artifact(Path::new(&record.artifact_path)) {
                        Ok(artifact) => latest_probability(&artifact, &rows)?,
                        Err(_) => None,
                    };
                    (prob, accuracy)
                }
                None => (None, None),
            };

            gainers.push(TopGainer {
                ticker,
                var_30d,
                price_now: last,
                pred_up_d1,
                model_accuracy,
            });
        }

        gainers.sort_by(|a, b| b.var_30d.total_cmp(&a.var_30d));
        gainers.truncate(5);
        Ok(TopGainersResponse { top5: gainers })
    }
}

/// Up-move probability for the most recent feature row, or `None` when the
/// history is too short to build any feature row.
fn latest_probability(artifact: &TrainedArtifact, rows: &[PriceRecord]) -> Result<Option<f64>> {
    let table = build_features(rows);
    if table.is_empty() {
        return Ok(None);
    }

    let last = table.x.slice(s![table.len() - 1.., ..]).to_owned();
    let proba = artifact.pipeline.predict_proba(&last)?;
    Ok(proba.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::Trainer;
    use chrono::NaiveDate;

    fn test_service(db: Arc<Database>) -> MarketService {
        let config = Arc::new(Config {
            server: Default::default(),
            database: Default::default(),
            market_data: Default::default(),
            training: Default::default(),
        });
        let client = YahooClient::new("http://localhost:0").unwrap();
        MarketService::new(db, client, config)
    }

    fn seeded_rows(ticker: &str, n: usize, daily_ret: f64) -> Vec<PriceRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let price = 100.0 * (1.0 + daily_ret).powi(i as i32)
                    + (i as f64 * 0.7).sin();
                PriceRecord {
                    date: start + Duration::days(i as i64),
                    ticker: ticker.to_string(),
                    open: price,
                    high: price * 1.01,
                    low: price * 0.99,
                    close: price,
                    adjusted_close: price,
                    volume: 1_000_000.0 + i as f64 * 1_000.0,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_detail_unknown_ticker_is_no_data() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let service = test_service(db);

        assert!(matches!(
            service.stock_detail("XXXX9").await,
            Err(Error::NoData(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_without_model_degrades_to_null() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        db.replace_prices(&seeded_rows("PETR4", 80, 0.005))
            .await
            .unwrap();
        let service = test_service(db);

        let detail = service.stock_detail("PETR4").await.unwrap();
        assert_eq!(detail.ticker, "PETR4");
        assert_eq!(detail.history_30d.len(), 30);
        assert!(detail.classification_d1.pred_up.is_none());
        assert!(detail.classification_d1.prob_up.is_none());
        assert_eq!(detail.projection_7d.len(), 7);
    }

    #[tokio::test]
    async fn test_detail_with_trained_model() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        db.replace_prices(&seeded_rows("PETR4", 80, 0.005))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(db.clone(), dir.path());
        trainer.train_one("PETR4", None).await.unwrap();

        let service = test_service(db);
        let detail = service.stock_detail("PETR4").await.unwrap();

        let prob = detail.classification_d1.prob_up.unwrap();
        assert!((0.0..=1.0).contains(&prob));
        assert!(detail.classification_d1.pred_up.is_some());
        assert!(detail.classification_d1.model_metrics["accuracy"].is_number());
        assert_eq!(detail.projection_7d.len(), 7);
    }

    #[tokio::test]
    async fn test_detail_short_history_annotates_projection_error() {
        // 13 rows: a valid history but too few lagged returns to fit the
        // return regression.
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        db.replace_prices(&seeded_rows("CASH3", 13, 0.005))
            .await
            .unwrap();
        let service = test_service(db);

        let detail = service.stock_detail("CASH3").await.unwrap();
        assert!(detail.projection_7d.is_empty());
        assert!(detail.classification_d1.model_metrics["projection_error"].is_string());
        assert_eq!(detail.history_30d.len(), 13);
    }

    #[tokio::test]
    async fn test_trained_artifact_with_short_recent_history_nulls_classification() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        db.replace_prices(&seeded_rows("PETR4", 80, 0.005))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(db.clone(), dir.path());
        trainer.train_one("PETR4", None).await.unwrap();

        // Shrink the snapshot below the rolling-window minimum; the
        // artifact row and file stay behind.
        db.replace_prices(&seeded_rows("PETR4", 13, 0.005))
            .await
            .unwrap();

        let service = test_service(db);
        let detail = service.stock_detail("PETR4").await.unwrap();

        assert!(detail.classification_d1.prob_up.is_none());
        assert!(detail.classification_d1.pred_up.is_none());
        assert!(detail.classification_d1.model_metrics["accuracy"].is_number());
        assert_eq!(detail.history_30d.len(), 13);
    }

    #[tokio::test]
    async fn test_detail_accepts_source_notation() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        db.replace_prices(&seeded_rows("PETR4", 80, 0.005))
            .await
            .unwrap();
        let service = test_service(db);

        let detail = service.stock_detail("PETR4.SA").await.unwrap();
        assert_eq!(detail.ticker, "PETR4");
    }

    #[tokio::test]
    async fn test_top_gainers_ranked_and_capped() {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let mut rows = Vec::new();
        for (i, ticker) in ["AAAA3", "BBBB3", "CCCC3", "DDDD3", "EEEE3", "FFFF3"]
            .iter()
            .enumerate()
        {
            rows.extend(seeded_rows(ticker, 40, 0.001 * (i + 1) as f64));
        }
        // Too short to rank.
        rows.extend(seeded_rows("GGGG3", 20, 0.05));
        db.replace_prices(&rows).await.unwrap();

        let service = test_service(db);
        let response = service.top_gainers().await.unwrap();

        assert_eq!(response.top5.len(), 5);
        assert_eq!(response.top5[0].ticker, "FFFF3");
        assert!(response
            .top5
            .windows(2)
            .all(|w| w[0].var_30d >= w[1].var_30d));
        assert!(!response.top5.iter().any(|g| g.ticker == "GGGG3"));
        assert!(response.top5[0].pred_up_d1.is_none());
    }
}
