//! HTTP API
//!
//! Four routes over the service layer: refresh the snapshot, rank top
//! movers, fetch one ticker's detail view, and trigger training. Errors map
//! onto status codes through `IntoResponse` so handlers stay thin.

use crate::error::Error;
use crate::ml::Trainer;
use crate::service::MarketService;
use crate::types::TrainRequest;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Shared handler state.
pub struct AppState {
    pub service: MarketService,
    pub trainer: Trainer,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NoData(_) | Error::MissingArtifact(_) => StatusCode::NOT_FOUND,
            Error::Fetch { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Health check
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Re-download and replace the price snapshot
async fn update_market(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Error> {
    let outcome = state.service.update_market().await?;
    Ok(Json(outcome))
}

/// Top five tickers by trailing 30-day return
async fn top_gainers(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, Error> {
    let response = state.service.top_gainers().await?;
    Ok(Json(response))
}

/// Detail view for one ticker
async fn stock_detail(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let detail = state.service.stock_detail(&ticker).await?;
    Ok(Json(detail))
}

/// Train one ticker, or every stored ticker when none is given. The body is
/// optional; no body at all means "train everything".
async fn train(
    State(state): State<Arc<AppState>>,
    request: Option<Json<TrainRequest>>,
) -> Result<impl IntoResponse, Error> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    match request.ticker {
        Some(ticker) => {
            let (metrics, path) = state
                .trainer
                .train_one(&ticker, request.version.as_deref())
                .await?;
            Ok(Json(serde_json::json!({
                "status": "ok",
                "ticker": ticker,
                "metrics": metrics.to_json(),
                "artifact_path": path.display().to_string(),
            })))
        }
        None => {
            let statuses = state.trainer.train_all(request.version.as_deref()).await?;
            Ok(Json(serde_json::to_value(statuses)?))
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/update-market", post(update_market))
        .route("/top-gainers", get(top_gainers))
        .route("/stocks/{ticker}", get(stock_detail))
        .route("/train", post(train))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{host}:{port}");
    tracing::info!("API server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
