pub mod admin;
pub mod auth;
pub mod compiler;
pub mod health;
pub mod student;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{auth as guard, cors::api_cors, rate_limit};
use crate::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The whole HTTP surface. Every `/api` route shares one per-IP limiter.
pub fn router(state: AppState, limiter: rate_limit::RateLimiter) -> Router {
    let auth_api = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let student_api = Router::new()
        .route("/api/student/tests", get(student::list_tests))
        .route("/api/student/tests/:id", get(student::get_test))
        .route("/api/student/tests/:id/start", post(student::start_test))
        .route(
            "/api/student/tests/:id/submit-answer",
            post(student::submit_answer),
        )
        .route(
            "/api/student/tests/:id/complete-section",
            post(student::complete_section),
        )
        .route("/api/student/tests/:id/submit", post(student::submit_test))
        .route(
            "/api/student/tests/:id/report-violation",
            post(student::report_violation),
        )
        .route("/api/student/tests/:id/status", get(student::get_status))
        .route("/api/student/tests/:id/results", get(student::get_results))
        .layer(from_fn(guard::require_student));

    let admin_api = Router::new()
        .route(
            "/api/admin/tests",
            get(admin::list_tests).post(admin::create_test),
        )
        .route(
            "/api/admin/tests/:id",
            get(admin::get_test)
                .patch(admin::update_test)
                .delete(admin::delete_test),
        )
        .route("/api/admin/tests/:id/invite", post(admin::invite_students))
        .route("/api/admin/tests/:id/results", get(admin::list_results))
        .route("/api/admin/attempts/:id", get(admin::get_attempt))
        .layer(from_fn(guard::require_admin));

    let compiler_api = Router::new()
        .route("/api/compiler/run", post(compiler::run_code))
        .route("/api/compiler/submit", post(compiler::submit_code))
        .layer(from_fn(guard::require_user));

    let api = auth_api
        .merge(student_api)
        .merge(admin_api)
        .merge(compiler_api)
        .layer(from_fn_with_state(limiter, rate_limit::rate_limit_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
