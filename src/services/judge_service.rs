use std::sync::Arc;

use crate::error::Result;
use crate::models::answer::TestCaseResult;
use crate::models::question::{CodingDetails, TestCase};
use crate::services::code_executor::{CodeExecutor, ExecutionOutput};

const HIDDEN: &str = "hidden";

/// Runs coding answers against a question's test cases through the
/// injected executor.
#[derive(Clone)]
pub struct JudgeService {
    executor: Arc<dyn CodeExecutor>,
}

impl JudgeService {
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        Self { executor }
    }

    /// Visible test cases only.
    pub async fn run(&self, coding: &CodingDetails, code: &str, language: &str) -> Result<Vec<TestCaseResult>> {
        let visible: Vec<&TestCase> = coding.test_cases.iter().filter(|t| !t.is_hidden).collect();
        self.run_cases(&visible, code, language).await
    }

    /// Every test case; hidden ones come back with their data masked.
    pub async fn submit(&self, coding: &CodingDetails, code: &str, language: &str) -> Result<Vec<TestCaseResult>> {
        let all: Vec<&TestCase> = coding.test_cases.iter().collect();
        self.run_cases(&all, code, language).await
    }

    pub async fn run_custom(&self, code: &str, language: &str, input: &str) -> Result<ExecutionOutput> {
        self.executor.execute(code, language, input).await
    }

    async fn run_cases(&self, cases: &[&TestCase], code: &str, language: &str) -> Result<Vec<TestCaseResult>> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let output = self.executor.execute(code, language, &case.input).await?;
            let passed = output.error.is_none() && outputs_match(&case.output, &output.output);
            tracing::debug!(language, passed, time_ms = output.time_ms, "Test case executed");

            results.push(if case.is_hidden {
                TestCaseResult {
                    passed,
                    input: HIDDEN.to_string(),
                    expected_output: HIDDEN.to_string(),
                    actual_output: HIDDEN.to_string(),
                    error: output.error.map(|_| "Runtime error".to_string()),
                }
            } else {
                TestCaseResult {
                    passed,
                    input: case.input.clone(),
                    expected_output: case.output.clone(),
                    actual_output: output.output,
                    error: output.error,
                }
            });
        }
        Ok(results)
    }
}

/// Outputs match when equal after normalizing line endings and trailing
/// whitespace on every line.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    normalize(expected) == normalize(actual)
}

fn normalize(output: &str) -> String {
    output
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::services::code_executor::MockCodeExecutor;
    use mockall::predicate::eq;

    fn problem() -> CodingDetails {
        CodingDetails {
            problem_statement: "double".into(),
            input_format: None,
            output_format: None,
            examples: vec![],
            constraints: None,
            test_cases: vec![
                TestCase { input: "1".into(), output: "2".into(), is_hidden: false },
                TestCase { input: "2".into(), output: "4".into(), is_hidden: false },
                TestCase { input: "5".into(), output: "10".into(), is_hidden: true },
            ],
        }
    }

    fn output(text: &str) -> ExecutionOutput {
        ExecutionOutput { output: text.into(), error: None, time_ms: 3 }
    }

    #[test]
    fn normalization_ignores_line_endings_and_trailing_space() {
        assert!(outputs_match("1\n2\n", "1 \r\n2"));
        assert!(!outputs_match("1 2", "1  2"));
        assert!(!outputs_match("abc", "ABC"));
    }

    #[tokio::test]
    async fn run_skips_hidden_cases() {
        let mut executor = MockCodeExecutor::new();
        executor
            .expect_execute()
            .with(eq("code"), eq("python"), eq("1"))
            .returning(|_, _, _| Ok(output("2\n")));
        executor
            .expect_execute()
            .with(eq("code"), eq("python"), eq("2"))
            .returning(|_, _, _| Ok(output("5")));

        let judge = JudgeService::new(Arc::new(executor));
        let results = judge.run(&problem(), "code", "python").await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].actual_output, "5");
    }

    #[tokio::test]
    async fn submit_masks_hidden_cases() {
        let mut executor = MockCodeExecutor::new();
        executor.expect_execute().times(3).returning(|_, _, input| {
            let n: i64 = input.parse().unwrap();
            Ok(output(&(n * 2).to_string()))
        });

        let judge = JudgeService::new(Arc::new(executor));
        let results = judge.submit(&problem(), "code", "cpp").await.unwrap();

        assert!(results.iter().all(|r| r.passed));
        assert_eq!(results[2].input, HIDDEN);
        assert_eq!(results[2].expected_output, HIDDEN);
    }

    #[tokio::test]
    async fn runtime_errors_fail_the_case() {
        let mut executor = MockCodeExecutor::new();
        executor.expect_execute().returning(|_, _, _| {
            Ok(ExecutionOutput {
                output: "2".into(),
                error: Some("segfault".into()),
                time_ms: 1,
            })
        });

        let judge = JudgeService::new(Arc::new(executor));
        let results = judge.run(&problem(), "code", "c").await.unwrap();
        assert!(results.iter().all(|r| !r.passed));
        assert_eq!(results[0].error.as_deref(), Some("segfault"));
    }

    #[tokio::test]
    async fn judge_outage_propagates() {
        let mut executor = MockCodeExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Err(Error::Judge("connection refused".into())));

        let judge = JudgeService::new(Arc::new(executor));
        let err = judge.submit(&problem(), "code", "java").await.unwrap_err();
        assert!(matches!(err, Error::Judge(_)));
    }
}
