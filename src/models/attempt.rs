use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::answer::SubmittedAnswer;
use crate::models::score::ScoreReport;
use crate::models::violation::Violation;

pub const STATUS_NOT_STARTED: &str = "not_started";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_SUBMITTED: &str = "submitted";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub test_id: Uuid,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_section_index: i32,
    pub section_attempts: Json<Vec<SectionAttempt>>,
    pub violations: Json<Vec<Violation>>,
    pub total_score: Option<f64>,
    pub max_score: Option<f64>,
    pub percentage: Option<i32>,
    pub score_report: Option<Json<ScoreReport>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionAttempt {
    pub section_id: Uuid,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SectionAttempt {
    pub fn new(section_id: Uuid) -> Self {
        Self {
            section_id,
            answers: Vec::new(),
            completed_at: None,
        }
    }

    pub fn answer_for(&self, question_id: Uuid) -> Option<&SubmittedAnswer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}

/// Where an attempt sits in the session lifecycle.
///
/// `SectionComplete` is never persisted: completing a section immediately
/// moves the attempt to the next `InProgress` section or to `Submitted`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress { section_index: usize },
    SectionComplete { section_index: usize },
    Submitted,
}

impl Attempt {
    pub fn state(&self) -> SessionState {
        match self.status.as_str() {
            STATUS_SUBMITTED => SessionState::Submitted,
            STATUS_IN_PROGRESS => SessionState::InProgress {
                section_index: self.current_section_index.max(0) as usize,
            },
            _ => SessionState::NotStarted,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.status == STATUS_SUBMITTED
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == STATUS_IN_PROGRESS
    }

    pub fn section_attempt(&self, section_id: Uuid) -> Option<&SectionAttempt> {
        self.section_attempts.0.iter().find(|s| s.section_id == section_id)
    }

    pub fn time_taken_seconds(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
            _ => None,
        }
    }
}
