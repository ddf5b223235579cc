use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::Answer;
use crate::models::attempt::SessionState;
use crate::models::question::{Question, QuestionDetails};
use crate::models::score::ScoreReport;
use crate::models::test::{ProctoringConfig, Section, Test};
use crate::models::violation::ViolationType;
use crate::services::session_service::Deadlines;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentTestSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub attempt_status: Option<String>,
    pub percentage: Option<i32>,
}

/// A test as shown to a student: correct options and hidden test cases
/// are stripped.
#[derive(Debug, Clone, Serialize)]
pub struct StudentTestView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub proctoring: ProctoringConfig,
    pub sections: Vec<StudentSectionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSectionView {
    pub id: Uuid,
    pub name: String,
    pub time_limit_minutes: i32,
    pub order: i32,
    pub questions: Vec<JsonValue>,
}

impl StudentTestView {
    pub fn from_test(test: &Test) -> Self {
        Self {
            id: test.id,
            title: test.title.clone(),
            description: test.description.clone(),
            start_date: test.start_date,
            end_date: test.end_date,
            duration_minutes: test.duration_minutes,
            proctoring: test.proctoring.0,
            sections: test.ordered_sections().into_iter().map(section_view).collect(),
        }
    }
}

fn section_view(section: &Section) -> StudentSectionView {
    StudentSectionView {
        id: section.id,
        name: section.name.clone(),
        time_limit_minutes: section.time_limit_minutes,
        order: section.order,
        questions: section.questions.iter().map(question_view).collect(),
    }
}

fn question_view(question: &Question) -> JsonValue {
    let mut sanitized = question.clone();
    match &mut sanitized.details {
        QuestionDetails::SingleCorrect(choices) | QuestionDetails::MultiCorrect(choices) => {
            for option in &mut choices.options {
                option.is_correct = false;
            }
        }
        QuestionDetails::Coding(coding) => coding.test_cases.retain(|t| !t.is_hidden),
    }

    let mut value = serde_json::to_value(&sanitized).unwrap_or(JsonValue::Null);
    if let Some(options) = value.get_mut("options").and_then(|o| o.as_array_mut()) {
        for option in options {
            if let Some(obj) = option.as_object_mut() {
                obj.remove("is_correct");
            }
        }
    }
    value
}

#[derive(Debug, Clone, Serialize)]
pub struct StartTestResponse {
    pub attempt_id: Uuid,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub current_section_index: i32,
    pub deadlines: Option<Deadlines>,
    pub test: StudentTestView,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub answer: Answer,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAnswerResponse {
    pub saved: bool,
    pub question_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteSectionRequest {
    pub section_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteSectionResponse {
    pub completed_section_id: Uuid,
    pub state: SessionState,
    pub next_section_index: Option<usize>,
    pub result: Option<SubmitTestResponse>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitTestResponse {
    pub attempt_id: Uuid,
    pub status: String,
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportViolationRequest {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub details: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub attempt_id: Uuid,
    pub state: SessionState,
    pub current_section_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub deadlines: Option<Deadlines>,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub deadlines_enforced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub title: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
    pub attempted: usize,
    pub correct: usize,
    pub report: ScoreReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{ChoiceDetails, CodingDetails, QuestionOption, TestCase};

    #[test]
    fn answers_are_stripped_from_questions() {
        let mcq = Question {
            id: Uuid::new_v4(),
            question: "Pick".into(),
            points: None,
            details: QuestionDetails::SingleCorrect(ChoiceDetails {
                options: vec![
                    QuestionOption { text: "a".into(), is_correct: false },
                    QuestionOption { text: "b".into(), is_correct: true },
                ],
            }),
        };
        let view = question_view(&mcq);
        assert_eq!(view["type"], "single-correct");
        let options = view["options"].as_array().unwrap();
        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|o| o.get("is_correct").is_none()));
        assert_eq!(options[1]["text"], "b");
    }

    #[test]
    fn hidden_test_cases_are_removed() {
        let coding = Question {
            id: Uuid::new_v4(),
            question: "Echo".into(),
            points: Some(5.0),
            details: QuestionDetails::Coding(CodingDetails {
                problem_statement: "Echo the input".into(),
                input_format: None,
                output_format: None,
                examples: vec![],
                constraints: None,
                test_cases: vec![
                    TestCase { input: "1".into(), output: "1".into(), is_hidden: false },
                    TestCase { input: "secret".into(), output: "secret".into(), is_hidden: true },
                ],
            }),
        };
        let view = question_view(&coding);
        let cases = view["test_cases"].as_array().unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0]["input"], "1");
        assert_eq!(view["problem_statement"], "Echo the input");
    }
}
