use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub question: String,
    /// Falls back to one point when absent.
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(flatten)]
    pub details: QuestionDetails,
}

impl Question {
    pub fn max_points(&self) -> f64 {
        self.points.unwrap_or(1.0)
    }

    pub fn question_type(&self) -> QuestionType {
        self.details.question_type()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    SingleCorrect,
    MultiCorrect,
    Coding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionDetails {
    SingleCorrect(ChoiceDetails),
    MultiCorrect(ChoiceDetails),
    Coding(CodingDetails),
}

impl QuestionDetails {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionDetails::SingleCorrect(_) => QuestionType::SingleCorrect,
            QuestionDetails::MultiCorrect(_) => QuestionType::MultiCorrect,
            QuestionDetails::Coding(_) => QuestionType::Coding,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceDetails {
    pub options: Vec<QuestionOption>,
}

impl ChoiceDetails {
    pub fn correct_indices(&self) -> Vec<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodingDetails {
    pub problem_statement: String,
    #[serde(default)]
    pub input_format: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub examples: Vec<CodingExample>,
    #[serde(default)]
    pub constraints: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodingExample {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_tagged_question_variants() {
        let raw = json!({
            "id": "6c7f1f9e-5d9b-4d8e-9a57-1d1f0f7b8a10",
            "type": "multi-correct",
            "question": "Pick the primes",
            "options": [
                {"text": "2", "is_correct": true},
                {"text": "4"},
                {"text": "5", "is_correct": true}
            ]
        });
        let q: Question = serde_json::from_value(raw).unwrap();
        assert_eq!(q.question_type(), QuestionType::MultiCorrect);
        assert_eq!(q.max_points(), 1.0);
        match q.details {
            QuestionDetails::MultiCorrect(ref c) => assert_eq!(c.correct_indices(), vec![0, 2]),
            _ => panic!("expected multi-correct"),
        }
    }

    #[test]
    fn coding_question_keeps_points_and_cases() {
        let raw = json!({
            "type": "coding",
            "question": "Sum",
            "points": 10.0,
            "problem_statement": "Add two numbers",
            "test_cases": [
                {"input": "1 2", "output": "3"},
                {"input": "5 5", "output": "10", "is_hidden": true}
            ]
        });
        let q: Question = serde_json::from_value(raw).unwrap();
        assert_eq!(q.max_points(), 10.0);
        let QuestionDetails::Coding(c) = q.details else {
            panic!("expected coding");
        };
        assert_eq!(c.test_cases.len(), 2);
        assert!(c.test_cases[1].is_hidden);
    }
}
