use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    CreateTestPayload, InviteStudentsPayload, ListTestsQuery, UpdateTestPayload,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::test_service::TestFilter;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.test_service.create_test(payload, claims.sub).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<ListTestsQuery>,
) -> Result<impl IntoResponse> {
    let filter = TestFilter {
        is_active: query.is_active,
        search: query.search,
    };
    let tests = state
        .test_service
        .list_tests(query.page.unwrap_or(1), query.per_page.unwrap_or(20), filter)
        .await?;
    Ok(Json(tests))
}

#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.test_service.get_test_by_id(test_id).await?;
    Ok(Json(test))
}

#[axum::debug_handler]
pub async fn update_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<UpdateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.test_service.update_test(test_id, payload).await?;
    Ok(Json(test))
}

#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if !state.test_service.delete_test(test_id).await? {
        return Err(Error::NotFound(format!("Test {} not found", test_id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn invite_students(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<InviteStudentsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .test_service
        .invite_students(test_id, payload.emails)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.attempt_service.list_results_for_test(test_id).await?;
    Ok(Json(results))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.attempt_service.get_attempt_detail(attempt_id).await?;
    Ok(Json(detail))
}
