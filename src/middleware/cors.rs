use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The single-page client may be served from any origin; credentials travel
/// in the `Authorization` header, never cookies.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
