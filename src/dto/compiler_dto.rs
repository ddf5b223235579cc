use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::TestCaseResult;

#[derive(Debug, Deserialize, Validate)]
pub struct RunCodeRequest {
    pub test_id: Uuid,
    pub question_id: Uuid,
    #[validate(length(min = 1, max = 65536, message = "Code must be between 1 and 65536 characters"))]
    pub code: String,
    #[validate(length(min = 1, message = "Language is required"))]
    pub language: String,
    /// When present, runs against this input instead of the visible test cases.
    pub custom_input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunCodeResponse {
    pub results: Vec<TestCaseResult>,
    pub passed: usize,
    pub total: usize,
}

impl RunCodeResponse {
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let total = results.len();
        Self {
            results,
            passed,
            total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomRunResponse {
    pub output: String,
    pub error: Option<String>,
    pub time_ms: u64,
}
