//! Crate-wide error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Too few price rows to train or build features. Reported, not retried.
    #[error("insufficient data for {ticker}: {rows} rows")]
    InsufficientData { ticker: String, rows: usize },

    /// Nothing in the store to answer with.
    #[error("no data: {0}")]
    NoData(String),

    /// No trained artifact yet. Read paths treat this as an absence, not a failure.
    #[error("no trained model for ticker {0}")]
    MissingArtifact(String),

    /// Market data download failed for one symbol.
    #[error("market data fetch failed for {symbol}: {reason}")]
    Fetch { symbol: String, reason: String },

    /// Model fitting or projection failed.
    #[error("model error: {0}")]
    Model(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("artifact i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn insufficient(ticker: &str, rows: usize) -> Self {
        Self::InsufficientData {
            ticker: ticker.to_string(),
            rows,
        }
    }
}
