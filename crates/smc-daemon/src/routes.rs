//! Operator HTTP surface: health, status, halt. Localhost only; the
//! daemon is not a public service.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::state::{AppState, StatusSnapshot};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status))
        .route("/v1/halt", post(halt))
        .layer(cors_localhost_only())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "smc-daemon",
        "version": env!("CARGO_PKG_VERSION"),
        "ok": true,
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusSnapshot>, StatusCode> {
    state
        .status
        .read()
        .map(|s| Json(s.clone()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn halt(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.request_halt();
    Json(serde_json::json!({ "halted": true }))
}

fn cors_localhost_only() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ]
    .iter()
    .filter_map(|o| HeaderValue::from_str(o).ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
}
