use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::dto::admin_dto::{
    CreateTestPayload, InviteStudentsResponse, InvitedStudent, UpdateTestPayload,
};
use crate::dto::student_dto::StudentTestSummary;
use crate::error::{Error, Result};
use crate::models::question::QuestionDetails;
use crate::models::test::{Section, Test};
use crate::models::user::{User, ROLE_STUDENT};

#[derive(Debug, serde::Serialize)]
pub struct PaginatedTests {
    #[serde(rename = "items")]
    pub tests: Vec<Test>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Default)]
pub struct TestFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_test(&self, payload: CreateTestPayload, created_by: Uuid) -> Result<Test> {
        let mut sections = payload.sections;
        validate_sections(&mut sections)?;
        validate_window(payload.start_date, payload.end_date)?;
        warn_on_duration_mismatch(&payload.title, &sections, payload.duration_minutes);

        let test = sqlx::query_as::<_, Test>(
            r#"
            INSERT INTO tests (
                title, description, start_date, end_date, duration_minutes,
                sections, proctoring, is_active, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(payload.title.trim())
        .bind(payload.description)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .bind(payload.duration_minutes)
        .bind(Json(sections))
        .bind(Json(payload.proctoring))
        .bind(payload.is_active.unwrap_or(true))
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(test_id = %test.id, title = %test.title, "Test created");
        Ok(test)
    }

    pub async fn get_test_by_id(&self, test_id: Uuid) -> Result<Test> {
        sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    pub async fn update_test(&self, test_id: Uuid, payload: UpdateTestPayload) -> Result<Test> {
        let mut test = self.get_test_by_id(test_id).await?;

        if let Some(title) = payload.title {
            test.title = title;
        }
        if payload.description.is_some() {
            test.description = payload.description;
        }
        if let Some(start_date) = payload.start_date {
            test.start_date = start_date;
        }
        if let Some(end_date) = payload.end_date {
            test.end_date = end_date;
        }
        if let Some(duration) = payload.duration_minutes {
            test.duration_minutes = duration;
        }
        if let Some(mut sections) = payload.sections {
            validate_sections(&mut sections)?;
            let open_attempts = self.count_in_progress(test_id).await?;
            if open_attempts > 0 {
                return Err(Error::Conflict(format!(
                    "Sections cannot change while {} attempt(s) are in progress",
                    open_attempts
                )));
            }
            test.sections = Json(sections);
        }
        if let Some(proctoring) = payload.proctoring {
            test.proctoring = Json(proctoring);
        }
        if let Some(is_active) = payload.is_active {
            test.is_active = is_active;
        }
        validate_window(test.start_date, test.end_date)?;
        warn_on_duration_mismatch(&test.title, &test.sections.0, test.duration_minutes);

        let updated = sqlx::query_as::<_, Test>(
            r#"
            UPDATE tests
            SET
                title = $1,
                description = $2,
                start_date = $3,
                end_date = $4,
                duration_minutes = $5,
                sections = $6,
                proctoring = $7,
                is_active = $8,
                updated_at = NOW()
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.start_date)
        .bind(test.end_date)
        .bind(test.duration_minutes)
        .bind(&test.sections)
        .bind(&test.proctoring)
        .bind(test.is_active)
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(test_id = %updated.id, is_active = updated.is_active, "Test updated");
        Ok(updated)
    }

    async fn count_in_progress(&self, test_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attempts WHERE test_id = $1 AND status = 'in_progress'",
        )
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_tests(
        &self,
        page: i64,
        per_page: i64,
        filter: TestFilter,
    ) -> Result<PaginatedTests> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;
        let search_param: Option<String> = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tests
            WHERE ($1::bool IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR (title ILIKE $2 OR description ILIKE $2))
            "#,
        )
        .bind(filter.is_active)
        .bind(&search_param)
        .fetch_one(&self.pool)
        .await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        let tests = sqlx::query_as::<_, Test>(
            r#"
            SELECT * FROM tests
            WHERE ($1::bool IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR (title ILIKE $2 OR description ILIKE $2))
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.is_active)
        .bind(&search_param)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(PaginatedTests {
            tests,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn delete_test(&self, test_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(test_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!(test_id = %test_id, "Test deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Resolves each email to a student, creating placeholder accounts for
    /// unknown addresses, and adds them to the test's allow-list.
    pub async fn invite_students(
        &self,
        test_id: Uuid,
        emails: Vec<String>,
    ) -> Result<InviteStudentsResponse> {
        let (valid, mut rejected) = normalize_emails(emails);

        let mut tx = self.pool.begin().await?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tests WHERE id = $1 FOR UPDATE")
            .bind(test_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Test {} not found", test_id)));
        }

        let mut invited = Vec::with_capacity(valid.len());
        for email in valid {
            let placeholder_name = email.split('@').next().unwrap_or(&email).to_string();
            let user = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (name, email, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
                RETURNING *
                "#,
            )
            .bind(placeholder_name)
            .bind(&email)
            .bind(ROLE_STUDENT)
            .fetch_one(&mut *tx)
            .await?;

            if user.is_admin() {
                tracing::warn!(email = %email, "Refusing to invite an administrator account");
                rejected.push(email);
                continue;
            }
            invited.push(InvitedStudent {
                student_id: user.id,
                email,
                registered: !user.is_placeholder(),
            });
        }

        let ids: Vec<Uuid> = invited.iter().map(|s| s.student_id).collect();
        let allowed: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE tests
            SET allowed_student_ids = ARRAY(
                    SELECT DISTINCT unnest(allowed_student_ids || $2::uuid[])
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING allowed_student_ids
            "#,
        )
        .bind(test_id)
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        for student in &invited {
            tracing::info!(
                test_id = %test_id,
                student_id = %student.student_id,
                email = %student.email,
                registered = student.registered,
                "Student invited"
            );
        }

        Ok(InviteStudentsResponse {
            test_id,
            invited,
            rejected,
            total_allowed: allowed.len(),
        })
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<StudentTestSummary>> {
        let tests = sqlx::query_as::<_, StudentTestSummary>(
            r#"
            SELECT
                t.id, t.title, t.description, t.start_date, t.end_date,
                t.duration_minutes, t.is_active,
                a.status AS attempt_status,
                a.percentage
            FROM tests t
            LEFT JOIN attempts a ON a.test_id = t.id AND a.student_id = $1
            WHERE $1 = ANY(t.allowed_student_ids)
            ORDER BY t.start_date ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tests)
    }
}

/// Checks the question invariants and renumbers sections so that `order`
/// is dense and starts at zero.
pub fn validate_sections(sections: &mut [Section]) -> Result<()> {
    if sections.is_empty() {
        return Err(Error::BadRequest("A test needs at least one section".to_string()));
    }

    let mut section_ids = HashSet::new();
    let mut question_ids = HashSet::new();
    for section in sections.iter() {
        if section.name.trim().is_empty() {
            return Err(Error::BadRequest("Section name cannot be empty".to_string()));
        }
        if section.time_limit_minutes < 1 {
            return Err(Error::BadRequest(format!(
                "Section '{}' needs a time limit of at least 1 minute",
                section.name
            )));
        }
        if !section_ids.insert(section.id) {
            return Err(Error::BadRequest(format!("Duplicate section id {}", section.id)));
        }

        for question in &section.questions {
            if !question_ids.insert(question.id) {
                return Err(Error::BadRequest(format!("Duplicate question id {}", question.id)));
            }
            if question.question.trim().is_empty() {
                return Err(Error::BadRequest("Question text cannot be empty".to_string()));
            }
            if question.points.is_some_and(|p| !p.is_finite() || p < 0.0) {
                return Err(Error::BadRequest(format!(
                    "Question {} has invalid points",
                    question.id
                )));
            }

            match &question.details {
                QuestionDetails::SingleCorrect(choices) => {
                    if choices.options.len() < 2 {
                        return Err(Error::BadRequest(format!(
                            "Question {} needs at least two options",
                            question.id
                        )));
                    }
                    if choices.correct_indices().len() != 1 {
                        return Err(Error::BadRequest(format!(
                            "Single-correct question {} must have exactly one correct option",
                            question.id
                        )));
                    }
                }
                QuestionDetails::MultiCorrect(choices) => {
                    if choices.options.len() < 2 {
                        return Err(Error::BadRequest(format!(
                            "Question {} needs at least two options",
                            question.id
                        )));
                    }
                    if choices.correct_indices().is_empty() {
                        return Err(Error::BadRequest(format!(
                            "Multi-correct question {} must have at least one correct option",
                            question.id
                        )));
                    }
                }
                QuestionDetails::Coding(coding) => {
                    if coding.problem_statement.trim().is_empty() {
                        return Err(Error::BadRequest(format!(
                            "Coding question {} needs a problem statement",
                            question.id
                        )));
                    }
                }
            }
        }
    }

    sections.sort_by_key(|s| s.order);
    for (idx, section) in sections.iter_mut().enumerate() {
        section.order = idx as i32;
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(Error::BadRequest("end_date must be after start_date".to_string()));
    }
    Ok(())
}

fn warn_on_duration_mismatch(title: &str, sections: &[Section], duration_minutes: i32) {
    let total: i32 = sections.iter().map(|s| s.time_limit_minutes).sum();
    if total != duration_minutes {
        tracing::warn!(
            title,
            section_minutes = total,
            duration_minutes,
            "Section time limits do not add up to the test duration"
        );
    }
}

/// Lowercases and dedupes addresses; malformed ones come back separately.
fn normalize_emails(emails: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for email in emails {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            continue;
        }
        if !email.validate_email() {
            rejected.push(email);
        } else if seen.insert(email.clone()) {
            valid.push(email);
        }
    }
    (valid, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{
        ChoiceDetails, CodingDetails, Question, QuestionOption,
    };

    fn choice(correct: &[usize], multi: bool) -> Question {
        let choices = ChoiceDetails {
            options: (0..3)
                .map(|i| QuestionOption {
                    text: format!("option {}", i),
                    is_correct: correct.contains(&i),
                })
                .collect(),
        };
        Question {
            id: Uuid::new_v4(),
            question: "Which?".into(),
            points: Some(2.0),
            details: if multi {
                QuestionDetails::MultiCorrect(choices)
            } else {
                QuestionDetails::SingleCorrect(choices)
            },
        }
    }

    fn section(name: &str, order: i32, questions: Vec<Question>) -> Section {
        Section {
            id: Uuid::new_v4(),
            name: name.into(),
            time_limit_minutes: 10,
            questions,
            order,
        }
    }

    #[test]
    fn sections_are_renumbered_in_order() {
        let mut sections = vec![
            section("b", 7, vec![choice(&[1], false)]),
            section("a", 3, vec![choice(&[0, 2], true)]),
        ];
        validate_sections(&mut sections).unwrap();
        assert_eq!(sections[0].name, "a");
        assert_eq!(sections[0].order, 0);
        assert_eq!(sections[1].order, 1);
    }

    #[test]
    fn single_correct_needs_exactly_one_answer() {
        let mut two = vec![section("s", 0, vec![choice(&[0, 1], false)])];
        assert!(matches!(validate_sections(&mut two), Err(Error::BadRequest(_))));

        let mut none = vec![section("s", 0, vec![choice(&[], false)])];
        assert!(matches!(validate_sections(&mut none), Err(Error::BadRequest(_))));
    }

    #[test]
    fn multi_correct_needs_a_correct_option() {
        let mut sections = vec![section("s", 0, vec![choice(&[], true)])];
        assert!(validate_sections(&mut sections).is_err());
    }

    #[test]
    fn coding_needs_a_statement() {
        let coding = Question {
            id: Uuid::new_v4(),
            question: "Sum".into(),
            points: None,
            details: QuestionDetails::Coding(CodingDetails {
                problem_statement: "   ".into(),
                input_format: None,
                output_format: None,
                examples: vec![],
                constraints: None,
                test_cases: vec![],
            }),
        };
        let mut sections = vec![section("s", 0, vec![coding])];
        assert!(validate_sections(&mut sections).is_err());
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let q = choice(&[0], false);
        let mut sections = vec![
            section("a", 0, vec![q.clone()]),
            section("b", 1, vec![q]),
        ];
        assert!(validate_sections(&mut sections).is_err());
    }

    #[test]
    fn empty_section_list_is_rejected() {
        assert!(validate_sections(&mut []).is_err());
    }

    #[test]
    fn window_must_be_forward() {
        let now = Utc::now();
        assert!(validate_window(now, now).is_err());
        assert!(validate_window(now, now + chrono::Duration::hours(1)).is_ok());
    }

    #[test]
    fn emails_are_normalized_and_deduplicated() {
        let (valid, rejected) = normalize_emails(vec![
            " Alice@Example.com ".into(),
            "alice@example.com".into(),
            "not-an-email".into(),
            "".into(),
            "bob@example.com".into(),
        ]);
        assert_eq!(valid, vec!["alice@example.com", "bob@example.com"]);
        assert_eq!(rejected, vec!["not-an-email"]);
    }
}
