use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::admin_dto::{AttemptDetail, ResultRow, TestResultsResponse};
use crate::dto::student_dto::{ResultsResponse, StatusResponse};
use crate::error::{Error, Result};
use crate::models::answer::Answer;
use crate::models::attempt::Attempt;
use crate::models::score::ScoreReport;
use crate::models::test::Test;
use crate::models::user::User;
use crate::services::session_service::{SectionOutcome, SessionService};

/// Persists session transitions. Every mutation loads the attempt row with
/// `FOR UPDATE`, applies the pure transition and writes it back in the same
/// transaction.
#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
    enforce_deadlines: bool,
}

#[derive(Debug, FromRow)]
struct ResultRecord {
    attempt_id: Uuid,
    name: String,
    email: String,
    registration_number: Option<String>,
    status: String,
    total_score: Option<f64>,
    max_score: Option<f64>,
    percentage: Option<i32>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    violation_count: i32,
}

impl From<ResultRecord> for ResultRow {
    fn from(r: ResultRecord) -> Self {
        let time_taken_seconds = match (r.start_time, r.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        };
        ResultRow {
            attempt_id: r.attempt_id,
            name: r.name,
            email: r.email,
            registration_number: r.registration_number,
            score: r.total_score,
            max_score: r.max_score,
            percentage: r.percentage,
            time_taken_seconds,
            submission_time: r.end_time,
            status: r.status,
            violation_count: r.violation_count,
        }
    }
}

impl AttemptService {
    pub fn new(pool: PgPool, enforce_deadlines: bool) -> Self {
        Self {
            pool,
            enforce_deadlines,
        }
    }

    pub async fn start(&self, test_id: Uuid, student_id: Uuid) -> Result<(Attempt, Test)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let test = load_test(&mut tx, test_id).await?;
        let existing = lock_attempt(&mut tx, test_id, student_id).await?;
        let reused = existing.is_some();

        let attempt = SessionService::begin(&test, student_id, existing, now)?;

        let saved = if reused {
            write_attempt(&mut tx, &attempt).await?
        } else {
            sqlx::query_as::<_, Attempt>(
                r#"
                INSERT INTO attempts (
                    id, student_id, test_id, status, start_time,
                    current_section_index, section_attempts
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (student_id, test_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(attempt.id)
            .bind(attempt.student_id)
            .bind(attempt.test_id)
            .bind(&attempt.status)
            .bind(attempt.start_time)
            .bind(attempt.current_section_index)
            .bind(&attempt.section_attempts)
            .fetch_optional(&mut *tx)
            .await?
        };

        // A concurrent start won the unique (student, test) index.
        let Some(saved) = saved else {
            return Err(Error::AlreadyStarted);
        };
        tx.commit().await?;

        tracing::info!(
            attempt_id = %saved.id,
            test_id = %test_id,
            student_id = %student_id,
            "Attempt started"
        );
        Ok((saved, test))
    }

    pub async fn submit_answer(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        question_id: Uuid,
        answer: Answer,
    ) -> Result<DateTime<Utc>> {
        let (_, saved_at) = self
            .mutate(test_id, student_id, |test, attempt, now| {
                SessionService::submit_answer(test, attempt, question_id, answer, now)?;
                Ok(now)
            })
            .await?;
        tracing::debug!(test_id = %test_id, question_id = %question_id, "Answer saved");
        Ok(saved_at)
    }

    pub async fn complete_section(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        section_id: Uuid,
    ) -> Result<(Attempt, SectionOutcome)> {
        let (attempt, outcome) = self
            .mutate(test_id, student_id, |test, attempt, now| {
                SessionService::complete_section(test, attempt, section_id, now)
            })
            .await?;

        match &outcome {
            SectionOutcome::Advanced {
                completed_index,
                next_index,
            } => tracing::info!(
                attempt_id = %attempt.id,
                completed_index,
                next_index,
                "Section completed"
            ),
            SectionOutcome::Submitted(report) => tracing::info!(
                attempt_id = %attempt.id,
                total_score = report.total_score,
                percentage = report.percentage,
                "Last section completed, attempt submitted"
            ),
        }
        Ok((attempt, outcome))
    }

    /// Finalizes the attempt. A second call returns the stored result.
    pub async fn submit(&self, test_id: Uuid, student_id: Uuid) -> Result<(Attempt, ScoreReport)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let test = load_test(&mut tx, test_id).await?;
        let mut attempt = lock_attempt(&mut tx, test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test has not been started".to_string()))?;

        if attempt.is_submitted() {
            let report = stored_report(&attempt)?;
            return Ok((attempt, report));
        }

        let report = SessionService::submit(&test, &mut attempt, now);
        let saved = match write_attempt(&mut tx, &attempt).await? {
            Some(saved) => saved,
            None => {
                // Finalized by someone else in between; their result stands.
                let current = find_attempt(&mut *tx, test_id, student_id)
                    .await?
                    .ok_or_else(|| Error::Internal("Attempt vanished during submit".to_string()))?;
                let report = stored_report(&current)?;
                return Ok((current, report));
            }
        };
        tx.commit().await?;

        tracing::info!(
            attempt_id = %saved.id,
            total_score = report.total_score,
            max_score = report.max_score,
            percentage = report.percentage,
            "Attempt submitted"
        );
        Ok((saved, report))
    }

    pub async fn status(&self, test_id: Uuid, student_id: Uuid) -> Result<StatusResponse> {
        let test = sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;
        let attempt = find_attempt(&self.pool, test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test has not been started".to_string()))?;

        let now = Utc::now();
        let state = attempt.state();
        let current_section_id = attempt
            .is_in_progress()
            .then(|| test.section_at(attempt.current_section_index.max(0) as usize))
            .flatten()
            .map(|s| s.id);
        let questions_answered = attempt
            .section_attempts
            .0
            .iter()
            .map(|s| s.answers.len())
            .sum();
        let total_questions = test.sections.0.iter().map(|s| s.questions.len()).sum();

        Ok(StatusResponse {
            attempt_id: attempt.id,
            state,
            current_section_id,
            start_time: attempt.start_time,
            end_time: attempt.end_time,
            deadlines: SessionService::deadlines(&test, &attempt, now),
            questions_answered,
            total_questions,
            deadlines_enforced: self.enforce_deadlines,
        })
    }

    pub async fn results(&self, test_id: Uuid, student_id: Uuid) -> Result<ResultsResponse> {
        let attempt = find_attempt(&self.pool, test_id, student_id)
            .await?
            .filter(Attempt::is_submitted)
            .ok_or_else(|| Error::NotFound("No submitted attempt for this test".to_string()))?;
        let title: String = sqlx::query_scalar("SELECT title FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_one(&self.pool)
            .await?;

        let report = stored_report(&attempt)?;
        Ok(ResultsResponse {
            attempt_id: attempt.id,
            test_id,
            title,
            start_time: attempt.start_time,
            end_time: attempt.end_time,
            time_taken_seconds: attempt.time_taken_seconds(),
            attempted: report.attempted_count(),
            correct: report.correct_count(),
            report,
        })
    }

    pub async fn list_results_for_test(&self, test_id: Uuid) -> Result<TestResultsResponse> {
        let title: String = sqlx::query_scalar("SELECT title FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        let records = sqlx::query_as::<_, ResultRecord>(
            r#"
            SELECT
                a.id AS attempt_id,
                u.name,
                u.email,
                u.registration_number,
                a.status,
                a.total_score,
                a.max_score,
                a.percentage,
                a.start_time,
                a.end_time,
                jsonb_array_length(a.violations) AS violation_count
            FROM attempts a
            JOIN users u ON u.id = a.student_id
            WHERE a.test_id = $1
            ORDER BY a.end_time DESC NULLS LAST, u.name ASC
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(TestResultsResponse {
            test_id,
            title,
            results: records.into_iter().map(ResultRow::from).collect(),
        })
    }

    pub async fn get_attempt_detail(&self, attempt_id: Uuid) -> Result<AttemptDetail> {
        let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt_id)))?;
        let student = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(attempt.student_id)
            .fetch_one(&self.pool)
            .await?;
        let test_title: String = sqlx::query_scalar("SELECT title FROM tests WHERE id = $1")
            .bind(attempt.test_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(AttemptDetail {
            time_taken_seconds: attempt.time_taken_seconds(),
            test_title,
            student,
            attempt,
        })
    }

    pub async fn find_attempt(&self, test_id: Uuid, student_id: Uuid) -> Result<Option<Attempt>> {
        find_attempt(&self.pool, test_id, student_id).await
    }

    /// Id of the student's open attempt, if any.
    pub async fn find_attempt_id(&self, test_id: Uuid, student_id: Uuid) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar(
            "SELECT id FROM attempts WHERE test_id = $1 AND student_id = $2 AND status <> 'submitted'",
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Runs `apply` against the locked attempt and persists the result.
    /// With deadline enforcement on, an attempt past its overall deadline is
    /// submitted instead and the call fails with `TimeExpired`.
    async fn mutate<T, F>(&self, test_id: Uuid, student_id: Uuid, apply: F) -> Result<(Attempt, T)>
    where
        F: FnOnce(&Test, &mut Attempt, DateTime<Utc>) -> Result<T>,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let test = load_test(&mut tx, test_id).await?;
        let mut attempt = lock_attempt(&mut tx, test_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test has not been started".to_string()))?;

        if self.enforce_deadlines && SessionService::is_past_deadline(&test, &attempt, now) {
            let report = SessionService::submit(&test, &mut attempt, now);
            write_attempt(&mut tx, &attempt).await?;
            tx.commit().await?;
            tracing::warn!(
                attempt_id = %attempt.id,
                percentage = report.percentage,
                "Deadline passed, attempt auto-submitted"
            );
            return Err(Error::TimeExpired);
        }

        let value = apply(&test, &mut attempt, now)?;
        let saved = write_attempt(&mut tx, &attempt)
            .await?
            .ok_or(Error::AttemptClosed)?;
        tx.commit().await?;
        Ok((saved, value))
    }
}

async fn load_test(tx: &mut Transaction<'_, Postgres>, test_id: Uuid) -> Result<Test> {
    sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
        .bind(test_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
}

async fn lock_attempt(
    tx: &mut Transaction<'_, Postgres>,
    test_id: Uuid,
    student_id: Uuid,
) -> Result<Option<Attempt>> {
    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT * FROM attempts WHERE test_id = $1 AND student_id = $2 FOR UPDATE",
    )
    .bind(test_id)
    .bind(student_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(attempt)
}

async fn find_attempt<'e, E>(executor: E, test_id: Uuid, student_id: Uuid) -> Result<Option<Attempt>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT * FROM attempts WHERE test_id = $1 AND student_id = $2",
    )
    .bind(test_id)
    .bind(student_id)
    .fetch_optional(executor)
    .await?;
    Ok(attempt)
}

/// Writes every session column back. Violations are left alone; they are
/// appended by the violation writer. Returns `None` when the row was
/// already submitted.
async fn write_attempt(
    tx: &mut Transaction<'_, Postgres>,
    attempt: &Attempt,
) -> Result<Option<Attempt>> {
    let saved = sqlx::query_as::<_, Attempt>(
        r#"
        UPDATE attempts
        SET
            status = $2,
            start_time = $3,
            end_time = $4,
            current_section_index = $5,
            section_attempts = $6,
            total_score = $7,
            max_score = $8,
            percentage = $9,
            score_report = $10,
            updated_at = NOW()
        WHERE id = $1 AND status <> 'submitted'
        RETURNING *
        "#,
    )
    .bind(attempt.id)
    .bind(&attempt.status)
    .bind(attempt.start_time)
    .bind(attempt.end_time)
    .bind(attempt.current_section_index)
    .bind(&attempt.section_attempts)
    .bind(attempt.total_score)
    .bind(attempt.max_score)
    .bind(attempt.percentage)
    .bind(&attempt.score_report)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(saved)
}

fn stored_report(attempt: &Attempt) -> Result<ScoreReport> {
    attempt
        .score_report
        .as_ref()
        .map(|r| r.0.clone())
        .ok_or_else(|| Error::Internal(format!("Submitted attempt {} has no score", attempt.id)))
}
