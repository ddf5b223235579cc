use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionOutput {
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub time_ms: u64,
}

/// External code runner. Implementations must not execute code in-process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str, language: &str, input: &str) -> Result<ExecutionOutput>;
}

/// Posts each run to an external judge service.
#[derive(Clone)]
pub struct HttpJudgeExecutor {
    client: Client,
    base_url: String,
}

impl HttpJudgeExecutor {
    pub fn new(base_url: String, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CodeExecutor for HttpJudgeExecutor {
    async fn execute(&self, code: &str, language: &str, input: &str) -> Result<ExecutionOutput> {
        #[derive(Serialize)]
        struct ExecReq<'a> {
            code: &'a str,
            language: &'a str,
            input: &'a str,
        }

        let resp = self
            .client
            .post(format!("{}/execute", self.base_url))
            .header("Accept", "application/json")
            .json(&ExecReq {
                code,
                language,
                input,
            })
            .send()
            .await?;

        let status = resp.status();
        let txt = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Judge(format!("status {}: {}", status.as_u16(), txt)));
        }
        let parsed: ExecutionOutput = serde_json::from_str(&txt)
            .map_err(|e| Error::Judge(format!("unreadable response: {}", e)))?;
        Ok(parsed)
    }
}
