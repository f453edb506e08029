//! Yahoo Finance chart client
//!
//! Fetches daily OHLCV bars for one symbol over a date window. Callers treat
//! per-symbol failures as skippable during a refresh.

use crate::error::{Error, Result};
use crate::types::PriceRecord;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Yahoo Finance v8 chart API client.
#[derive(Clone)]
pub struct YahooClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
    adjclose: Option<Vec<AdjCloseBlock>>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    adjclose: Vec<Option<f64>>,
}

impl YahooClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("stockcast/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Daily bars for `symbol` between `start` and `end`, oldest first.
    /// Rows with any null quote value are skipped.
    pub async fn daily_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let envelope: ChartEnvelope = self
            .http
            .get(&url)
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", end.timestamp().to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,split".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let records = parse_chart(symbol, envelope)?;
        debug!(symbol, rows = records.len(), "fetched daily history");
        Ok(records)
    }
}

/// Exchange suffix is dropped for storage: `VALE3.SA` → `VALE3`.
pub fn storage_ticker(symbol: &str) -> &str {
    symbol.strip_suffix(".SA").unwrap_or(symbol)
}

fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<PriceRecord>> {
    if let Some(err) = envelope.chart.error {
        return Err(Error::Fetch {
            symbol: symbol.to_string(),
            reason: err.description,
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| Error::Fetch {
            symbol: symbol.to_string(),
            reason: "empty chart result".to_string(),
        })?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().ok_or_else(|| Error::Fetch {
        symbol: symbol.to_string(),
        reason: "missing quote block".to_string(),
    })?;
    // Some instruments report no adjclose series; fall back to close.
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|mut a| if a.is_empty() { None } else { Some(a.remove(0).adjclose) });

    let ticker = storage_ticker(symbol).to_string();
    let mut records = Vec::with_capacity(timestamps.len());

    for (i, &ts) in timestamps.iter().enumerate() {
        let fields = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields else {
            continue;
        };
        let adjusted_close = adjclose
            .as_ref()
            .and_then(|a| a.get(i).copied().flatten())
            .unwrap_or(close);
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        records.push(PriceRecord {
            date,
            ticker: ticker.clone(),
            open,
            high,
            low,
            close,
            adjusted_close,
            volume,
        });
    }

    records.sort_by_key(|r| r.date);
    Ok(records)
}
