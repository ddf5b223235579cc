use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    TabSwitch,
    FocusLost,
    FullscreenExit,
    DevTools,
    RightClick,
    CopyPaste,
    ForbiddenKey,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}
