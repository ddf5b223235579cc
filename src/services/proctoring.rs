use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::models::violation::ViolationType;
use crate::services::violation_service::ViolationService;

/// Proctoring events a test-taking client can raise. Implementors only need
/// `report`; each hook maps its event onto a violation.
pub trait ProctoringHooks {
    fn report(&self, violation_type: ViolationType, description: String, details: Option<JsonValue>);

    fn on_focus_lost(&self, details: Option<JsonValue>) {
        self.report(ViolationType::FocusLost, "Test window lost focus".to_string(), details);
    }

    fn on_tab_switch(&self, details: Option<JsonValue>) {
        self.report(ViolationType::TabSwitch, "Switched to another tab".to_string(), details);
    }

    fn on_fullscreen_exit(&self, details: Option<JsonValue>) {
        self.report(ViolationType::FullscreenExit, "Exited full screen mode".to_string(), details);
    }

    fn on_dev_tools_suspected(&self, details: Option<JsonValue>) {
        self.report(ViolationType::DevTools, "Developer tools suspected".to_string(), details);
    }

    /// `details` defaults to `{"combo": combo}` when the client sent none.
    fn on_forbidden_key_combo(&self, combo: &str, details: Option<JsonValue>) {
        let details = details.or_else(|| Some(json!({ "combo": combo })));
        self.report(
            ViolationType::ForbiddenKey,
            format!("Forbidden key combination {}", combo),
            details,
        );
    }

    fn on_right_click(&self, details: Option<JsonValue>) {
        self.report(ViolationType::RightClick, "Right click attempted".to_string(), details);
    }

    fn on_copy_paste(&self, details: Option<JsonValue>) {
        self.report(ViolationType::CopyPaste, "Copy or paste attempted".to_string(), details);
    }

    /// Routes a client-reported event to the matching hook. A non-empty
    /// client description replaces the hook's default one.
    fn dispatch(&self, violation_type: ViolationType, description: Option<String>, details: Option<JsonValue>) {
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            self.report(violation_type, description, details);
            return;
        }
        match violation_type {
            ViolationType::FocusLost => self.on_focus_lost(details),
            ViolationType::TabSwitch => self.on_tab_switch(details),
            ViolationType::FullscreenExit => self.on_fullscreen_exit(details),
            ViolationType::DevTools => self.on_dev_tools_suspected(details),
            ViolationType::RightClick => self.on_right_click(details),
            ViolationType::CopyPaste => self.on_copy_paste(details),
            ViolationType::ForbiddenKey => {
                let combo = details
                    .as_ref()
                    .and_then(|d| d.get("combo"))
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                self.on_forbidden_key_combo(&combo, details);
            }
            ViolationType::Other => {
                self.report(ViolationType::Other, "Proctoring event".to_string(), details)
            }
        }
    }
}

/// Hooks bound to one attempt, feeding the violation log.
pub struct AttemptProctor {
    attempt_id: Uuid,
    violations: ViolationService,
}

impl AttemptProctor {
    pub fn new(attempt_id: Uuid, violations: ViolationService) -> Self {
        Self {
            attempt_id,
            violations,
        }
    }
}

impl ProctoringHooks for AttemptProctor {
    fn report(&self, violation_type: ViolationType, description: String, details: Option<JsonValue>) {
        self.violations
            .report(self.attempt_id, violation_type, description, details);
    }
}
