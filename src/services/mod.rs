pub mod attempt_service;
pub mod code_executor;
pub mod judge_service;
pub mod proctoring;
pub mod scoring_service;
pub mod session_service;
pub mod test_service;
pub mod user_service;
pub mod violation_service;
