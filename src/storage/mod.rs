//! SQLite persistence for price history and model metadata
//!
//! Two tables: `prices` holds the refresh-cycle snapshot of daily rows, and
//! `models` holds one metadata row per trained ticker pointing at the latest
//! artifact on disk.

use crate::error::Result;
use crate::types::{ModelRecord, PriceRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the SQLite file and run schema setup.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database for tests. A single pooled connection is required:
    /// every SQLite `:memory:` connection is its own database.
    pub async fn connect_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prices (
                date            TEXT NOT NULL,
                ticker          TEXT NOT NULL,
                open            REAL NOT NULL,
                high            REAL NOT NULL,
                low             REAL NOT NULL,
                close           REAL NOT NULL,
                adjusted_close  REAL NOT NULL,
                volume          REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS models (
                ticker          TEXT PRIMARY KEY,
                version         TEXT NOT NULL,
                artifact_path   TEXT NOT NULL,
                metrics         TEXT NOT NULL,
                trained_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Full refresh: delete every price row and reinsert the given snapshot
    /// in one transaction. Returns the number of rows inserted.
    pub async fn replace_prices(&self, records: &[PriceRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prices").execute(&mut *tx).await?;

        for r in records {
            sqlx::query(
                r#"
                INSERT INTO prices
                    (date, ticker, open, high, low, close, adjusted_close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(r.date)
            .bind(&r.ticker)
            .bind(r.open)
            .bind(r.high)
            .bind(r.low)
            .bind(r.close)
            .bind(r.adjusted_close)
            .bind(r.volume)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len() as u64)
    }

    /// All rows for one ticker, oldest first.
    pub async fn prices_for_ticker(&self, ticker: &str) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT date, ticker, open, high, low, close, adjusted_close, volume
            FROM prices
            WHERE ticker = ?
            ORDER BY date ASC
            "#,
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The most recent `n` rows for one ticker, returned oldest first.
    pub async fn last_n_prices(&self, ticker: &str, n: u32) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT date, ticker, open, high, low, close, adjusted_close, volume
            FROM (
                SELECT date, ticker, open, high, low, close, adjusted_close, volume
                FROM prices
                WHERE ticker = ?
                ORDER BY date DESC
                LIMIT ?
            )
            ORDER BY date ASC
            "#,
        )
        .bind(ticker)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Distinct tickers present in the price table, sorted.
    pub async fn list_tickers(&self) -> Result<Vec<String>> {
        let tickers =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT ticker FROM prices ORDER BY ticker")
                .fetch_all(&self.pool)
                .await?;

        Ok(tickers)
    }

    /// Insert or overwrite the metadata row for one ticker.
    pub async fn upsert_model(&self, record: &ModelRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO models (ticker, version, artifact_path, metrics, trained_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(ticker) DO UPDATE SET
                version = excluded.version,
                artifact_path = excluded.artifact_path,
                metrics = excluded.metrics,
                trained_at = excluded.trained_at
            "#,
        )
        .bind(&record.ticker)
        .bind(&record.version)
        .bind(&record.artifact_path)
        .bind(&record.metrics)
        .bind(record.trained_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Latest metadata row for one ticker, if any was ever trained.
    pub async fn latest_model(&self, ticker: &str) -> Result<Option<ModelRecord>> {
        let record = sqlx::query_as::<_, ModelRecord>(
            r#"
            SELECT ticker, version, artifact_path, metrics, trained_at
            FROM models
            WHERE ticker = ?
            "#,
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn sample_rows(ticker: &str, n: usize) -> Vec<PriceRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let price = 100.0 + i as f64;
                PriceRecord {
                    date: start + chrono::Duration::days(i as i64),
                    ticker: ticker.to_string(),
                    open: price - 0.5,
                    high: price + 1.0,
                    low: price - 1.0,
                    close: price,
                    adjusted_close: price,
                    volume: 1_000_000.0 + i as f64,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_replace_and_read_back() {
        let db = Database::connect_in_memory().await.unwrap();
        let rows = sample_rows("VALE3", 10);

        let inserted = db.replace_prices(&rows).await.unwrap();
        assert_eq!(inserted, 10);

        let back = db.prices_for_ticker("VALE3").await.unwrap();
        assert_eq!(back, rows);
    }

    #[tokio::test]
    async fn test_replace_is_a_full_refresh() {
        let db = Database::connect_in_memory().await.unwrap();
        db.replace_prices(&sample_rows("VALE3", 10)).await.unwrap();
        db.replace_prices(&sample_rows("PETR4", 5)).await.unwrap();

        assert!(db.prices_for_ticker("VALE3").await.unwrap().is_empty());
        assert_eq!(db.prices_for_ticker("PETR4").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_last_n_prices_oldest_first() {
        let db = Database::connect_in_memory().await.unwrap();
        db.replace_prices(&sample_rows("ITUB4", 40)).await.unwrap();

        let tail = db.last_n_prices("ITUB4", 30).await.unwrap();
        assert_eq!(tail.len(), 30);
        assert!(tail.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(tail.last().unwrap().close, 139.0);
    }

    #[tokio::test]
    async fn test_list_tickers_sorted() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut rows = sample_rows("VALE3", 3);
        rows.extend(sample_rows("ABEV3", 3));
        db.replace_prices(&rows).await.unwrap();

        let tickers = db.list_tickers().await.unwrap();
        assert_eq!(tickers, vec!["ABEV3".to_string(), "VALE3".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_model_keeps_one_row() {
        let db = Database::connect_in_memory().await.unwrap();

        let mut record = ModelRecord {
            ticker: "VALE3".into(),
            version: "20240101".into(),
            artifact_path: "artifacts/VALE3_20240101.json".into(),
            metrics: r#"{"accuracy":0.55}"#.into(),
            trained_at: Utc::now(),
        };
        db.upsert_model(&record).await.unwrap();

        record.version = "20240301".into();
        record.artifact_path = "artifacts/VALE3_20240301.json".into();
        db.upsert_model(&record).await.unwrap();

        let latest = db.latest_model("VALE3").await.unwrap().unwrap();
        assert_eq!(latest.version, "20240301");
        assert!(db.latest_model("PETR4").await.unwrap().is_none());
    }
}
