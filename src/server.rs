//! HTTP API for browser clients.
//!
//! Each route is a thin JSON wrapper around one [`Gateway`] operation.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;

use crate::{
    gateway::{
        ExtractRequest, ExtractResult, ExtractionError, Gateway, ValidateRequest,
        ValidateResult,
    },
    prelude::*,
};

/// Application state shared across routes.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Our gateway. Immutable, so requests never interact.
    pub gateway: Gateway,
}

/// Build our router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/extract", post(extract))
        .route("/api/validate", post(validate))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    id = %uuid::Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Serve our API on `addr` until interrupted.
#[instrument(level = "debug", skip(state))]
pub async fn serve(addr: SocketAddr, state: AppState, max_body_bytes: usize) -> Result<()> {
    let app = router(state, max_body_bytes);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to listen on {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {err}");
    }
    info!("Shutting down");
}

/// JSON body for failed requests.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ExtractionError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// `POST /api/extract`
async fn extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ExtractResult>, ExtractionError> {
    state.gateway.extract_text(&req.photo_data_uri).await.map(Json)
}

/// `POST /api/validate`
async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Json<ValidateResult> {
    Json(
        state
            .gateway
            .validate_edits(&req.original_text, &req.edited_text)
            .await,
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// `GET /api/health`
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
