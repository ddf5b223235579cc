use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "question_type", rename_all = "kebab-case")]
pub enum Answer {
    SingleCorrect {
        #[serde(default)]
        selected_options: Vec<usize>,
    },
    MultiCorrect {
        #[serde(default)]
        selected_options: Vec<usize>,
    },
    Coding {
        #[serde(default)]
        code: String,
        language: String,
        #[serde(default)]
        test_case_results: Vec<TestCaseResult>,
    },
}

impl Answer {
    pub fn question_type(&self) -> QuestionType {
        match self {
            Answer::SingleCorrect { .. } => QuestionType::SingleCorrect,
            Answer::MultiCorrect { .. } => QuestionType::MultiCorrect,
            Answer::Coding { .. } => QuestionType::Coding,
        }
    }

    /// Empty selections and blank code count as unattempted.
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::SingleCorrect { selected_options } | Answer::MultiCorrect { selected_options } => {
                selected_options.is_empty()
            }
            Answer::Coding { code, .. } => code.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCaseResult {
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub answer: Answer,
    pub answered_at: DateTime<Utc>,
}
