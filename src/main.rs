//! Stock history and prediction API
//!
//! Downloads daily price history, trains per-ticker direction and return
//! models, and serves predictions over HTTP.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use stockcast::{
    client::YahooClient,
    config::Config,
    ml::Trainer,
    server::{self, AppState},
    service::MarketService,
    storage::Database,
    types::TickerTrainStatus,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stockcast")]
#[command(about = "Stock price-history API with per-ticker prediction models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Refresh the price snapshot from the market data source
    UpdateMarket,
    /// Train classifiers, for one ticker or every stored ticker
    Train {
        /// Ticker to train; omit to train all
        #[arg(short, long)]
        ticker: Option<String>,
        /// Version label, defaults to today's YYYYMMDD
        #[arg(short, long)]
        version: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(Config::load(&cli.config)?);

    let db = Arc::new(Database::connect(&config.database.path).await?);
    let client = YahooClient::new(&config.market_data.base_url)?;
    let service = MarketService::new(db.clone(), client, config.clone());
    let trainer = Trainer::new(db.clone(), config.training.artifacts_dir.clone());

    match cli.command {
        Commands::Serve => {
            let state = Arc::new(AppState { service, trainer });
            server::serve(state, &config.server.host, config.server.port).await
        }
        Commands::UpdateMarket => {
            let outcome = service.update_market().await?;
            tracing::info!(rows = outcome.rows_refreshed, "refresh complete");
            Ok(())
        }
        Commands::Train { ticker, version } => {
            train_command(trainer, ticker, version).await
        }
    }
}

async fn train_command(
    trainer: Trainer,
    ticker: Option<String>,
    version: Option<String>,
) -> anyhow::Result<()> {
    match ticker {
        Some(ticker) => {
            let (metrics, path) = trainer.train_one(&ticker, version.as_deref()).await?;
            tracing::info!(
                %ticker,
                accuracy = metrics.accuracy,
                artifact = %path.display(),
                "training complete"
            );
        }
        None => {
            let statuses = trainer.train_all(version.as_deref()).await?;
            let failed = statuses
                .values()
                .filter(|s| matches!(s, TickerTrainStatus::Error { .. }))
                .count();
            tracing::info!(
                trained = statuses.len() - failed,
                failed,
                "batch training complete"
            );
        }
    }
    Ok(())
}
