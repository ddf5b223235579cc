use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::violation::{Violation, ViolationType};

#[derive(Debug, Clone, PartialEq)]
pub struct ViolationReport {
    pub attempt_id: Uuid,
    pub violation: Violation,
}

/// Fire-and-forget front of the violation log. Reports are timestamped here
/// and handed to a single background writer; a full or closed queue is logged
/// and otherwise ignored so proctoring never blocks the test flow.
#[derive(Clone)]
pub struct ViolationService {
    tx: mpsc::Sender<ViolationReport>,
}

impl ViolationService {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ViolationReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn report(
        &self,
        attempt_id: Uuid,
        violation_type: ViolationType,
        description: String,
        details: Option<JsonValue>,
    ) {
        let report = ViolationReport {
            attempt_id,
            violation: Violation {
                violation_type,
                description,
                details,
                timestamp: Utc::now(),
            },
        };
        if let Err(e) = self.tx.try_send(report) {
            tracing::warn!(%attempt_id, error = %e, "Dropping violation report");
        }
    }
}

pub struct ViolationWriter {
    pool: PgPool,
    rx: mpsc::Receiver<ViolationReport>,
}

impl ViolationWriter {
    pub fn new(pool: PgPool, rx: mpsc::Receiver<ViolationReport>) -> Self {
        Self { pool, rx }
    }

    pub async fn run(mut self) {
        while let Some(report) = self.rx.recv().await {
            match append_violation(&self.pool, &report).await {
                Ok(true) => tracing::info!(
                    attempt_id = %report.attempt_id,
                    kind = ?report.violation.violation_type,
                    "Violation recorded"
                ),
                Ok(false) => tracing::debug!(
                    attempt_id = %report.attempt_id,
                    "Violation ignored for missing or submitted attempt"
                ),
                Err(e) => tracing::error!(
                    attempt_id = %report.attempt_id,
                    error = ?e,
                    "Failed to record violation"
                ),
            }
        }
        tracing::info!("Violation writer stopped");
    }
}

/// Appends to the attempt's violation log. Returns `false` when the attempt
/// does not exist or has already been submitted.
pub async fn append_violation(pool: &PgPool, report: &ViolationReport) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE attempts
        SET violations = violations || jsonb_build_array($2::jsonb),
            updated_at = NOW()
        WHERE id = $1 AND status <> 'submitted'
        "#,
    )
    .bind(report.attempt_id)
    .bind(Json(&report.violation))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
