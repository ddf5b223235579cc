use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::Utc;
use validator::Validate;

use crate::dto::compiler_dto::{CustomRunResponse, RunCodeRequest, RunCodeResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::question::{CodingDetails, QuestionDetails};
use crate::services::session_service::SessionService;
use crate::AppState;

/// Runs code against the question's visible test cases, or against
/// `custom_input` when given.
#[axum::debug_handler]
pub async fn run_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RunCodeRequest>,
) -> Result<axum::response::Response> {
    payload.validate()?;
    let coding = load_coding_question(&state, &claims, &payload).await?;

    if let Some(input) = payload.custom_input.as_deref() {
        let output = state
            .judge
            .run_custom(&payload.code, &payload.language, input)
            .await?;
        return Ok(Json(CustomRunResponse {
            output: output.output,
            error: output.error,
            time_ms: output.time_ms,
        })
        .into_response());
    }

    let results = state
        .judge
        .run(&coding, &payload.code, &payload.language)
        .await?;
    Ok(Json(RunCodeResponse::from_results(results)).into_response())
}

/// Runs every test case. The caller stores the results through
/// submit-answer; nothing is persisted here.
#[axum::debug_handler]
pub async fn submit_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RunCodeRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let coding = load_coding_question(&state, &claims, &payload).await?;

    let results = state
        .judge
        .submit(&coding, &payload.code, &payload.language)
        .await?;
    let response = RunCodeResponse::from_results(results);
    tracing::info!(
        question_id = %payload.question_id,
        user_id = %claims.sub,
        passed = response.passed,
        total = response.total,
        "Code submitted to judge"
    );
    Ok(Json(response))
}

async fn load_coding_question(
    state: &AppState,
    claims: &Claims,
    payload: &RunCodeRequest,
) -> Result<CodingDetails> {
    let test = state.test_service.get_test_by_id(payload.test_id).await?;
    if !claims.is_admin() {
        let attempt = state
            .attempt_service
            .find_attempt(payload.test_id, claims.sub)
            .await?;
        SessionService::check_content_access(&test, claims.sub, attempt.as_ref(), Utc::now())?;
    }

    let (_, question) = test
        .find_question(payload.question_id)
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", payload.question_id)))?;
    match &question.details {
        QuestionDetails::Coding(coding) => Ok(coding.clone()),
        _ => Err(Error::BadRequest("Question is not a coding problem".to_string())),
    }
}
