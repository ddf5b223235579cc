use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, SubmittedAnswer};
use crate::models::attempt::{
    Attempt, SectionAttempt, SessionState, STATUS_IN_PROGRESS, STATUS_NOT_STARTED,
    STATUS_SUBMITTED,
};
use crate::models::question::{Question, QuestionDetails};
use crate::models::score::ScoreReport;
use crate::models::test::Test;
use crate::services::scoring_service::ScoringService;

/// Result of completing the current section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome {
    Advanced {
        completed_index: usize,
        next_index: usize,
    },
    Submitted(ScoreReport),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Deadlines {
    pub test_deadline: DateTime<Utc>,
    pub test_remaining_seconds: i64,
    pub section_deadline: Option<DateTime<Utc>>,
    pub section_remaining_seconds: Option<i64>,
}

/// Transitions of a single attempt. Every function is pure over the loaded
/// test and attempt; persistence lives in `AttemptService`.
pub struct SessionService;

impl SessionService {
    pub fn check_start(
        test: &Test,
        student_id: Uuid,
        existing: Option<&Attempt>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(attempt) = existing {
            if attempt.state() != SessionState::NotStarted {
                return Err(Error::AlreadyStarted);
            }
        }
        if !test.is_active {
            return Err(Error::TestInactive);
        }
        if !test.is_invited(student_id) {
            return Err(Error::NotInvited);
        }
        if !test.is_open_at(now) {
            return Err(Error::OutsideWindow);
        }
        Ok(())
    }

    /// Gates question content for a student. Once an attempt is under way
    /// (or finished) the content stays readable; before that the test must
    /// be active and inside its window, same as for `start`.
    pub fn check_content_access(
        test: &Test,
        student_id: Uuid,
        attempt: Option<&Attempt>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !test.is_invited(student_id) {
            return Err(Error::NotInvited);
        }
        if attempt.is_some_and(|a| a.state() != SessionState::NotStarted) {
            return Ok(());
        }
        if !test.is_active {
            return Err(Error::TestInactive);
        }
        if !test.is_open_at(now) {
            return Err(Error::OutsideWindow);
        }
        Ok(())
    }

    /// Creates a fresh attempt, or moves a reused `NotStarted` one into the
    /// first section.
    pub fn begin(
        test: &Test,
        student_id: Uuid,
        existing: Option<Attempt>,
        now: DateTime<Utc>,
    ) -> Result<Attempt> {
        Self::check_start(test, student_id, existing.as_ref(), now)?;

        let section_attempts: Vec<SectionAttempt> = test
            .ordered_sections()
            .iter()
            .map(|s| SectionAttempt::new(s.id))
            .collect();

        let mut attempt = existing.unwrap_or_else(|| Attempt {
            id: Uuid::new_v4(),
            student_id,
            test_id: test.id,
            status: STATUS_NOT_STARTED.to_string(),
            start_time: None,
            end_time: None,
            current_section_index: 0,
            section_attempts: Json(Vec::new()),
            violations: Json(Vec::new()),
            total_score: None,
            max_score: None,
            percentage: None,
            score_report: None,
            created_at: now,
            updated_at: now,
        });

        attempt.status = STATUS_IN_PROGRESS.to_string();
        attempt.start_time = Some(now);
        attempt.current_section_index = 0;
        attempt.section_attempts = Json(section_attempts);
        attempt.updated_at = now;
        Ok(attempt)
    }

    /// Upserts `answer` into the current section, replacing any earlier
    /// answer to the same question.
    pub fn submit_answer(
        test: &Test,
        attempt: &mut Attempt,
        question_id: Uuid,
        answer: Answer,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let section_index = Self::current_section_index(attempt)?;
        let section = test
            .section_at(section_index)
            .ok_or_else(|| Error::BadRequest("Attempt has no current section".to_string()))?;

        let question = match section.questions.iter().find(|q| q.id == question_id) {
            Some(q) => q,
            None if test.find_question(question_id).is_some() => {
                return Err(Error::BadRequest(
                    "Question does not belong to the current section".to_string(),
                ))
            }
            None => return Err(Error::NotFound(format!("Question {} not found", question_id))),
        };
        Self::validate_answer(question, &answer)?;

        let section_id = section.id;
        let sections = &mut attempt.section_attempts.0;
        if !sections.iter().any(|s| s.section_id == section_id) {
            sections.push(SectionAttempt::new(section_id));
        }
        let record = sections
            .iter_mut()
            .find(|s| s.section_id == section_id)
            .ok_or_else(|| Error::Internal("Section record missing".to_string()))?;

        let submitted = SubmittedAnswer {
            question_id,
            answer,
            answered_at: now,
        };
        match record.answers.iter().position(|a| a.question_id == question_id) {
            Some(pos) => record.answers[pos] = submitted,
            None => record.answers.push(submitted),
        }
        attempt.updated_at = now;
        Ok(())
    }

    pub fn complete_section(
        test: &Test,
        attempt: &mut Attempt,
        section_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SectionOutcome> {
        let section_index = Self::current_section_index(attempt)?;
        let sections = test.ordered_sections();

        let Some(current) = sections.get(section_index) else {
            return Ok(SectionOutcome::Submitted(Self::submit(test, attempt, now)));
        };
        if current.id != section_id {
            return Err(Error::WrongSection(section_id));
        }

        if let Some(record) = attempt
            .section_attempts
            .0
            .iter_mut()
            .find(|s| s.section_id == section_id)
        {
            record.completed_at = Some(now);
        } else {
            attempt.section_attempts.0.push(SectionAttempt {
                completed_at: Some(now),
                ..SectionAttempt::new(section_id)
            });
        }

        let next_index = section_index + 1;
        if next_index >= sections.len() {
            return Ok(SectionOutcome::Submitted(Self::submit(test, attempt, now)));
        }

        attempt.current_section_index = next_index as i32;
        attempt.updated_at = now;
        Ok(SectionOutcome::Advanced {
            completed_index: section_index,
            next_index,
        })
    }

    /// Finalizes the attempt. Calling it on a submitted attempt returns the
    /// stored score without touching anything.
    pub fn submit(test: &Test, attempt: &mut Attempt, now: DateTime<Utc>) -> ScoreReport {
        if attempt.is_submitted() {
            if let Some(report) = &attempt.score_report {
                return report.0.clone();
            }
        }

        let report = ScoringService::score(test, attempt);
        attempt.status = STATUS_SUBMITTED.to_string();
        attempt.end_time = attempt.end_time.or(Some(now));
        attempt.total_score = Some(report.total_score);
        attempt.max_score = Some(report.max_score);
        attempt.percentage = Some(report.percentage);
        attempt.score_report = Some(Json(report.clone()));
        attempt.updated_at = now;
        report
    }

    pub fn deadlines(test: &Test, attempt: &Attempt, now: DateTime<Utc>) -> Option<Deadlines> {
        let start = attempt.start_time?;
        let test_deadline = start + Duration::minutes(test.duration_minutes as i64);

        let (section_deadline, section_remaining_seconds) = match attempt.state() {
            SessionState::InProgress { section_index } => {
                match test.section_at(section_index) {
                    Some(section) => {
                        let section_start = Self::section_started_at(test, attempt, section_index)
                            .unwrap_or(start);
                        let deadline =
                            section_start + Duration::minutes(section.time_limit_minutes as i64);
                        (Some(deadline), Some((deadline - now).num_seconds().max(0)))
                    }
                    None => (None, None),
                }
            }
            _ => (None, None),
        };

        Some(Deadlines {
            test_deadline,
            test_remaining_seconds: (test_deadline - now).num_seconds().max(0),
            section_deadline,
            section_remaining_seconds,
        })
    }

    pub fn is_past_deadline(test: &Test, attempt: &Attempt, now: DateTime<Utc>) -> bool {
        attempt.is_in_progress()
            && Self::deadlines(test, attempt, now)
                .map(|d| now >= d.test_deadline)
                .unwrap_or(false)
    }

    pub fn validate_answer(question: &Question, answer: &Answer) -> Result<()> {
        match (&question.details, answer) {
            (QuestionDetails::SingleCorrect(choices), Answer::SingleCorrect { selected_options }) => {
                if selected_options.len() > 1 {
                    return Err(Error::BadRequest(
                        "Single-correct questions accept at most one option".to_string(),
                    ));
                }
                check_option_range(choices.options.len(), selected_options)
            }
            (QuestionDetails::MultiCorrect(choices), Answer::MultiCorrect { selected_options }) => {
                check_option_range(choices.options.len(), selected_options)
            }
            (QuestionDetails::Coding(_), Answer::Coding { language, .. }) => {
                if language.trim().is_empty() {
                    return Err(Error::BadRequest("Language is required".to_string()));
                }
                Ok(())
            }
            (details, answer) => Err(Error::BadRequest(format!(
                "Answer of type {:?} does not match question of type {:?}",
                answer.question_type(),
                details.question_type()
            ))),
        }
    }

    fn current_section_index(attempt: &Attempt) -> Result<usize> {
        match attempt.state() {
            SessionState::InProgress { section_index } => Ok(section_index),
            _ => Err(Error::AttemptClosed),
        }
    }

    /// A section's clock starts when the previous one was completed.
    fn section_started_at(
        test: &Test,
        attempt: &Attempt,
        section_index: usize,
    ) -> Option<DateTime<Utc>> {
        if section_index == 0 {
            return attempt.start_time;
        }
        let previous = test.section_at(section_index - 1)?;
        attempt.section_attempt(previous.id)?.completed_at
    }
}

fn check_option_range(option_count: usize, selected: &[usize]) -> Result<()> {
    match selected.iter().find(|i| **i >= option_count) {
        Some(i) => Err(Error::BadRequest(format!("Option index {} is out of range", i))),
        None => Ok(()),
    }
}
