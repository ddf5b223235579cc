use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::student_dto::{
    CompleteSectionRequest, CompleteSectionResponse, ReportViolationRequest, StartTestResponse,
    StudentTestView, SubmitAnswerRequest, SubmitAnswerResponse, SubmitTestResponse,
};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::attempt::{Attempt, SessionState};
use crate::models::score::ScoreReport;
use crate::services::proctoring::{AttemptProctor, ProctoringHooks};
use crate::services::session_service::{SectionOutcome, SessionService};
use crate::AppState;

#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let tests = state.test_service.list_for_student(claims.sub).await?;
    Ok(Json(json!({ "items": tests })))
}

#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.test_service.get_test_by_id(test_id).await?;
    let attempt = state.attempt_service.find_attempt(test_id, claims.sub).await?;
    SessionService::check_content_access(&test, claims.sub, attempt.as_ref(), Utc::now())?;
    Ok(Json(StudentTestView::from_test(&test)))
}

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (attempt, test) = state.attempt_service.start(test_id, claims.sub).await?;

    let response = StartTestResponse {
        attempt_id: attempt.id,
        status: attempt.status.clone(),
        start_time: attempt.start_time.unwrap_or_else(Utc::now),
        current_section_index: attempt.current_section_index,
        deadlines: SessionService::deadlines(&test, &attempt, Utc::now()),
        test: StudentTestView::from_test(&test),
    };
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question_id = payload.question_id;
    let timestamp = state
        .attempt_service
        .submit_answer(test_id, claims.sub, question_id, payload.answer)
        .await?;

    Ok(Json(SubmitAnswerResponse {
        saved: true,
        question_id,
        timestamp,
    }))
}

#[axum::debug_handler]
pub async fn complete_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<CompleteSectionRequest>,
) -> Result<impl IntoResponse> {
    let (attempt, outcome) = state
        .attempt_service
        .complete_section(test_id, claims.sub, payload.section_id)
        .await?;

    let response = match outcome {
        SectionOutcome::Advanced {
            completed_index,
            next_index,
        } => CompleteSectionResponse {
            completed_section_id: payload.section_id,
            state: SessionState::SectionComplete {
                section_index: completed_index,
            },
            next_section_index: Some(next_index),
            result: None,
        },
        SectionOutcome::Submitted(report) => CompleteSectionResponse {
            completed_section_id: payload.section_id,
            state: SessionState::Submitted,
            next_section_index: None,
            result: Some(submit_response(&attempt, &report)),
        },
    };
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn submit_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (attempt, report) = state.attempt_service.submit(test_id, claims.sub).await?;
    Ok(Json(submit_response(&attempt, &report)))
}

/// Always answers 202; reports without an open attempt are dropped.
#[axum::debug_handler]
pub async fn report_violation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<ReportViolationRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    match state.attempt_service.find_attempt_id(test_id, claims.sub).await {
        Ok(Some(attempt_id)) => {
            AttemptProctor::new(attempt_id, state.violations.clone()).dispatch(
                payload.violation_type,
                payload.description,
                payload.details,
            );
        }
        Ok(None) => tracing::debug!(
            test_id = %test_id,
            student_id = %claims.sub,
            "Violation reported without an open attempt"
        ),
        Err(e) => tracing::error!(error = ?e, test_id = %test_id, "Violation lookup failed"),
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": true }))))
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let status = state.attempt_service.status(test_id, claims.sub).await?;
    Ok(Json(status))
}

#[axum::debug_handler]
pub async fn get_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.attempt_service.results(test_id, claims.sub).await?;
    Ok(Json(results))
}

fn submit_response(attempt: &Attempt, report: &ScoreReport) -> SubmitTestResponse {
    SubmitTestResponse {
        attempt_id: attempt.id,
        status: attempt.status.clone(),
        total_score: report.total_score,
        max_score: report.max_score,
        percentage: report.percentage,
    }
}
