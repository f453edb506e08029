//! Classifier training and artifact persistence
//!
//! Trains one next-day direction pipeline per ticker on a chronological
//! 75/25 split, writes the fitted pipeline to a JSON artifact on disk, and
//! records the metadata row in SQLite. Batch runs report per-ticker status
//! instead of failing on the first bad ticker.

use crate::error::{Error, Result};
use crate::ml::features::{build_features, FEATURE_COLUMNS};
use crate::ml::metrics::{evaluate, EvalMetrics};
use crate::ml::pipeline::DirectionPipeline;
use crate::storage::Database;
use crate::types::{ModelRecord, TickerTrainStatus};
use chrono::Utc;
use ndarray::s;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum raw price rows before a training attempt is made.
pub const MIN_TRAIN_ROWS: usize = 60;

/// Everything needed to score a ticker later, serialized to one JSON file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainedArtifact {
    pub ticker: String,
    pub version: String,
    pub feature_columns: Vec<String>,
    pub pipeline: DirectionPipeline,
    pub metrics: EvalMetrics,
}

/// Load an artifact written by [`Trainer::train_one`].
pub fn load_artifact(path: &Path) -> Result<TrainedArtifact> {
    if !path.exists() {
        return Err(Error::MissingArtifact(path.display().to_string()));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub struct Trainer {
    db: Arc<Database>,
    artifacts_dir: PathBuf,
}

impl Trainer {
    pub fn new(db: Arc<Database>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Train, evaluate and persist the classifier for one ticker.
    ///
    /// `version` defaults to today's `YYYYMMDD`. The artifact lands at
    /// `{artifacts_dir}/{ticker}_{version}.json` and the metadata row
    /// replaces any previous one for the ticker.
    pub async fn train_one(
        &self,
        ticker: &str,
        version: Option<&str>,
    ) -> Result<(EvalMetrics, PathBuf)> {
        let rows = self.db.prices_for_ticker(ticker).await?;
        if rows.len() < MIN_TRAIN_ROWS {
            return Err(Error::insufficient(ticker, rows.len()));
        }

        let table = build_features(&rows);
        if table.is_empty() {
            return Err(Error::insufficient(ticker, rows.len()));
        }

        // Chronological split, most recent quarter held out.
        let n = table.len();
        let n_test = ((n as f64) * 0.25).ceil() as usize;
        let n_train = n - n_test;
        if n_train == 0 || n_test == 0 {
            return Err(Error::insufficient(ticker, rows.len()));
        }

        let x_train = table.x.slice(s![..n_train, ..]).to_owned();
        let y_train = table.y.slice(s![..n_train]).to_owned();
        let x_test = table.x.slice(s![n_train.., ..]).to_owned();
        let y_test = table.y.slice(s![n_train..]).to_owned();

        let pipeline = DirectionPipeline::fit(&x_train, &y_train)?;
        let proba = pipeline.predict_proba(&x_test)?;
        let metrics = evaluate(&y_test, &proba);

        let today = Utc::now().format("%Y%m%d").to_string();
        let version = version.unwrap_or(&today).to_string();

        let artifact = TrainedArtifact {
            ticker: ticker.to_string(),
            version: version.clone(),
            feature_columns: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            pipeline,
            metrics: metrics.clone(),
        };

        std::fs::create_dir_all(&self.artifacts_dir)?;
        let path = self.artifacts_dir.join(format!("{ticker}_{version}.json"));
        std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;

        self.db
            .upsert_model(&ModelRecord {
                ticker: ticker.to_string(),
                version,
                artifact_path: path.display().to_string(),
                metrics: serde_json::to_string(&metrics)?,
                trained_at: Utc::now(),
            })
            .await?;

        info!(
            ticker,
            accuracy = metrics.accuracy,
            roc_auc = metrics.roc_auc,
            "trained classifier"
        );
        Ok((metrics, path))
    }

    /// Train every ticker present in the price table, sequentially.
    ///
    /// Tickers that fail (short history, degenerate features) are reported
    /// in the status map rather than aborting the run. An empty price table
    /// is an error: there is nothing to iterate.
    pub async fn train_all(
        &self,
        version: Option<&str>,
    ) -> Result<BTreeMap<String, TickerTrainStatus>> {
        let tickers = self.db.list_tickers().await?;
        if tickers.is_empty() {
            return Err(Error::NoData("no price history loaded".into()));
        }

        let mut statuses = BTreeMap::new();
        for ticker in tickers {
            let status = match self.train_one(&ticker, version).await {
                Ok((metrics, path)) => TickerTrainStatus::Ok {
                    metrics: metrics.to_json(),
                    artifact_path: path.display().to_string(),
                },
                Err(e) => {
                    warn!(%ticker, error = %e, "training failed");
                    TickerTrainStatus::Error {
                        error: e.to_string(),
                    }
                }
            };
            statuses.insert(ticker, status);
        }
        Ok(statuses)
    }
}
