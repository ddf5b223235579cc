pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    attempt_service::AttemptService, code_executor::CodeExecutor, judge_service::JudgeService,
    test_service::TestService, user_service::UserService, violation_service::ViolationService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub test_service: TestService,
    pub attempt_service: AttemptService,
    pub user_service: UserService,
    pub judge: JudgeService,
    pub violations: ViolationService,
}

impl AppState {
    /// The code executor and the violation queue are injected so tests can
    /// swap in mocks and read the queue directly.
    pub fn new(
        pool: PgPool,
        config: &Config,
        executor: Arc<dyn CodeExecutor>,
        violations: ViolationService,
    ) -> Self {
        let test_service = TestService::new(pool.clone());
        let attempt_service = AttemptService::new(pool.clone(), config.enforce_deadlines);
        let user_service = UserService::new(pool, config.jwt_secret.clone(), config.jwt_ttl_hours);
        let judge = JudgeService::new(executor);

        Self {
            test_service,
            attempt_service,
            user_service,
            judge,
            violations,
        }
    }
}
