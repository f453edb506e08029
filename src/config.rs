//! Configuration
//!
//! Loaded from a TOML file with `STOCKCAST_*` environment overrides. Every
//! value has a default except nothing security-sensitive: there are no
//! embedded credentials anywhere in this file.

use crate::error::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, created on first connect.
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Symbols to refresh, in data-source notation (`.SA` suffix for B3).
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    /// Calendar days of history fetched per refresh.
    #[serde(default = "default_history_days")]
    pub history_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Directory where fitted model artifacts are written.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "data/stockcast.db".to_string()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_history_days() -> i64 {
    180
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

/// Main Ibovespa constituents, in Yahoo notation.
fn default_tickers() -> Vec<String> {
    [
        "VALE3.SA", "ITUB4.SA", "PETR4.SA", "PETR3.SA", "ELET3.SA", "BBDC4.SA",
        "SBSP3.SA", "B3SA3.SA", "BPAC11.SA", "ITSA4.SA", "BBAS3.SA", "EMBR3.SA",
        "WEGE3.SA", "ABEV3.SA", "EQTL3.SA", "RDOR3.SA", "RENT3.SA", "SUZB3.SA",
        "ENEV3.SA", "PRIO3.SA", "VBBR3.SA", "VIVT3.SA", "TOTS3.SA", "RADL3.SA",
        "UGPA3.SA", "BBDC3.SA", "CMIG4.SA", "GGBR4.SA", "CPLE6.SA", "RAIL3.SA",
        "ALOS3.SA", "BBSE3.SA", "BRFS3.SA", "NTCO3.SA", "HYPE3.SA", "KLBN11.SA",
        "TIMS3.SA", "CSAN3.SA", "CCRO3.SA", "MULT3.SA", "MGLU3.SA", "CSNA3.SA",
        "JBSS3.SA", "HAPV3.SA", "LREN3.SA", "ASAI3.SA", "CIEL3.SA", "CRFB3.SA",
        "PCAR3.SA", "YDUQ3.SA", "AZUL4.SA", "SLCE3.SA", "USIM5.SA", "TAEE11.SA",
        "CYRE3.SA", "COGN3.SA", "BRKM5.SA", "CMIN3.SA", "GOAU4.SA", "MRFG3.SA",
        "CVCB3.SA", "IRBR3.SA", "BEEF3.SA", "RRRP3.SA", "MRVE3.SA", "EZTC3.SA",
        "PETZ3.SA", "CASH3.SA", "DXCO3.SA",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tickers: default_tickers(),
            history_days: default_history_days(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file (optional) plus environment
    /// overrides of the form `STOCKCAST_SERVER__PORT=9000`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("STOCKCAST")
                    .separator("__")
                    .list_separator(",")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_market_data_defaults() {
        let config: MarketDataConfig = toml::from_str("").unwrap();
        assert_eq!(config.base_url, "https://query1.finance.yahoo.com");
        assert_eq!(config.history_days, 180);
        assert!(config.tickers.iter().any(|t| t == "PETR4.SA"));
        assert!(config.tickers.len() > 60);
    }

    #[test]
    fn test_market_data_deserialize() {
        let toml_str = r#"
base_url = "http://localhost:9999"
tickers = ["AAAA3.SA", "BBBB4.SA"]
history_days = 30
"#;
        let config: MarketDataConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "http://localhost:9999");
        assert_eq!(config.tickers.len(), 2);
        assert_eq!(config.history_days, 30);
    }

    #[test]
    fn test_database_config() {
        let toml_str = r#"
path = "data/test.db"
"#;
        let config: DatabaseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.path, "data/test.db");
    }

    #[test]
    fn test_training_config_default() {
        let config: TrainingConfig = toml::from_str("").unwrap();
        assert_eq!(config.artifacts_dir, "artifacts");
    }

    #[test]
    fn test_full_config_sections_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "data/stockcast.db");
        assert_eq!(config.training.artifacts_dir, "artifacts");
    }
}
