//! HTTP surface: `GET /search?query=...` and `GET /healthz`.
//!
//! Successful searches return a JSON array of products in ranked order; an
//! empty array means nothing matched. Failures never return an array:
//! validation failures are `400` with the rejection reason, everything else
//! is `500` naming the stage that failed. Internal error details are logged,
//! not sent to the client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info};
use serde::Serialize;
use tokio::net::TcpListener;

use crate::error::{KioskError, Result};
use crate::hybrid::HybridRetriever;
use crate::product::Product;
use crate::validation::QueryValidator;

/// Message sent with every non-validation failure.
pub const SEARCH_FAILURE_MESSAGE: &str = "Could not query products";

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<HybridRetriever>,
    validator: QueryValidator,
}

impl AppState {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self {
            retriever,
            validator: QueryValidator::new(),
        }
    }
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// A [`KioskError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub KioskError);

impl From<KioskError> for ApiError {
    fn from(err: KioskError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            KioskError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation",
                    reason: Some(err.reason.as_str()),
                    message: None,
                },
            ),
            err => {
                error!("search failed in {}: {}", err.stage(), err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: err.stage().name(),
                        reason: None,
                        message: Some(SEARCH_FAILURE_MESSAGE),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(handle_search))
        .route("/healthz", get(handle_health))
        .with_state(state)
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> std::result::Result<Json<Vec<Product>>, ApiError> {
    let started = Instant::now();
    let values: Vec<&str> = params
        .iter()
        .filter(|(key, _)| key == "query")
        .map(|(_, value)| value.as_str())
        .collect();
    let query = state
        .validator
        .validate_values(&values)
        .map_err(KioskError::from)?;

    let products = state.retriever.search(&query).await?;
    debug!(
        "GET /search {:?} -> {} products in {:?}",
        query,
        products.len(),
        started.elapsed()
    );
    Ok(Json(products))
}

async fn handle_health() -> StatusCode {
    StatusCode::OK
}

/// Serve until the process receives Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
