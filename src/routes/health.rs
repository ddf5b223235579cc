use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

/// Liveness only; does not touch the database.
#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "time": Utc::now(),
    });
    (StatusCode::OK, Json(body))
}
