//! Stock price-history store and prediction API
//!
//! Downloads daily price history for a ticker universe, stores it in SQLite,
//! trains simple per-ticker models and serves predictions over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! YahooClient → Database (prices) → Feature Builder → Trainer → Artifact (JSON)
//!                                                                   ↓
//!                       HTTP API ← MarketService ← Pipeline + Return Forecaster
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ml;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;
