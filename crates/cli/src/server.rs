//! HTTP surface: `GET /lookup` and `GET /health`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use engine::{handle_lookup, Store, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// State shared by all handlers.
pub struct AppState {
    pub store: Arc<Store>,
}

/// Query string of `/lookup`. `sku` and `rank` are accepted as aliases.
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    #[serde(default, alias = "sku")]
    key: Option<String>,
    #[serde(default, alias = "rank")]
    min_score: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    keys: usize,
    records: u64,
    build: String,
}

/// Error wrapper for API handlers
pub enum ApiError {
    Store(StoreError),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (error, message) = match self {
            ApiError::Store(e) => {
                let kind = match &e {
                    StoreError::Io(_) => "io_error",
                    StoreError::Corrupt { .. } => "corrupt_record",
                    StoreError::Index(_) | StoreError::Header(_) | StoreError::Mismatch(_) => {
                        "store_error"
                    }
                };
                (kind, e.to_string())
            }
            ApiError::Internal(msg) => ("internal_error", msg),
        };
        log::error!("lookup failed: {}", message);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error, message }),
        )
            .into_response()
    }
}

/// Creates the router over an opened store.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/lookup", get(lookup))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

/// Returns `[[target, score], ...]` ascending by score: 200 when non-empty,
/// 404 when empty.
async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Response, ApiError> {
    let store = Arc::clone(&state.store);
    let key = params.key.unwrap_or_default();
    let raw_min_score = params.min_score;

    let matches = tokio::task::spawn_blocking(move || {
        handle_lookup(&store, &key, raw_min_score.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let status = if matches.is_empty() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let body: Vec<(String, f64)> = matches.into_iter().map(|m| (m.target, m.score)).collect();
    Ok((status, Json(body)).into_response())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        keys: state.store.len(),
        records: state.store.records(),
        build: state.store.build_id().to_string(),
    })
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(store: Arc<Store>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(AppState { store })).await?;
    Ok(())
}
