use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Test has already been started")]
    AlreadyStarted,

    #[error("Test is not active")]
    TestInactive,

    #[error("Student is not invited to this test")]
    NotInvited,

    #[error("Test is not open at this time")]
    OutsideWindow,

    #[error("Section {0} is not the current section")]
    WrongSection(uuid::Uuid),

    #[error("Attempt is not in progress")]
    AttemptClosed,

    #[error("Time limit for this test has expired")]
    TimeExpired,

    #[error("Too many requests")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Judge error: {0}")]
    Judge(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::AlreadyStarted => "already_started",
            Error::TestInactive => "test_inactive",
            Error::NotInvited => "not_invited",
            Error::OutsideWindow => "outside_window",
            Error::WrongSection(_) => "wrong_section",
            Error::AttemptClosed => "attempt_closed",
            Error::TimeExpired => "time_expired",
            Error::RateLimited => "rate_limited",
            Error::Database(_) | Error::Migrate(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "invalid_json",
            Error::Anyhow(_) => "bad_request",
            Error::Reqwest(_) | Error::Judge(_) => "judge_unavailable",
            Error::Token(_) => "unauthorized",
            Error::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Json(_) | Error::Anyhow(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Unauthorized(_) | Error::Token(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) | Error::TestInactive | Error::NotInvited | Error::OutsideWindow => {
                StatusCode::FORBIDDEN
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_)
            | Error::AlreadyStarted
            | Error::WrongSection(_)
            | Error::AttemptClosed
            | Error::TimeExpired => StatusCode::CONFLICT,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Reqwest(_) | Error::Judge(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Database(_) | Error::Migrate(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            Error::Config(_) | Error::Database(_) | Error::Migrate(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "An unexpected error occurred".to_string()
            }
            Error::Reqwest(err) => format!("External service error: {}", err),
            Error::Judge(msg) => format!("External judge error: {}", msg),
            other => other.to_string(),
        };

        let body = Json(json!({ "error": self.code(), "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
