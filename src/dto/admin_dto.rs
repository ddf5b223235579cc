use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::Attempt;
use crate::models::test::{ProctoringConfig, Section};
use crate::models::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: i32,
    #[validate(length(min = 1, message = "A test needs at least one section"))]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub proctoring: ProctoringConfig,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTestPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: Option<i32>,

    pub sections: Option<Vec<Section>>,
    pub proctoring: Option<ProctoringConfig>,
    pub is_active: Option<bool>,
}

fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteStudentsPayload {
    #[validate(length(min = 1, message = "At least one email is required"))]
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitedStudent {
    pub student_id: Uuid,
    pub email: String,
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct InviteStudentsResponse {
    pub test_id: Uuid,
    pub invited: Vec<InvitedStudent>,
    pub rejected: Vec<String>,
    pub total_allowed: usize,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ListTestsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// One row of a test's results table, in the column order the client
/// exports: name, email, registration number, score, max score,
/// percentage, time taken, submission time.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub attempt_id: Uuid,
    pub name: String,
    pub email: String,
    pub registration_number: Option<String>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub percentage: Option<i32>,
    pub time_taken_seconds: Option<i64>,
    pub submission_time: Option<DateTime<Utc>>,
    pub status: String,
    pub violation_count: i32,
}

#[derive(Debug, Serialize)]
pub struct TestResultsResponse {
    pub test_id: Uuid,
    pub title: String,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Serialize)]
pub struct AttemptDetail {
    pub attempt: Attempt,
    pub student: User,
    pub test_title: String,
    pub time_taken_seconds: Option<i64>,
}
