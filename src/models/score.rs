use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: i32,
    pub per_question: Vec<QuestionScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionScore {
    pub question_id: Uuid,
    pub section_id: Uuid,
    pub question_type: QuestionType,
    pub earned: f64,
    /// `earned` rounded to one decimal for per-question breakdowns.
    pub earned_display: f64,
    pub max_points: f64,
    pub is_correct: bool,
    pub attempted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed_test_cases: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_test_cases: Option<usize>,
}

impl ScoreReport {
    pub fn attempted_count(&self) -> usize {
        self.per_question.iter().filter(|q| q.attempted).count()
    }

    pub fn correct_count(&self) -> usize {
        self.per_question.iter().filter(|q| q.is_correct).count()
    }
}
