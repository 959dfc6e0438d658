use crate::state_machine::ActivityState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Runtime record of one activity template executed inside a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub stage_id: String,
    pub activity_template_id: String,
    pub status: ActivityState,
    /// Executor response on success, `{"error": ...}` on failure
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn pending(
        id: impl Into<String>,
        stage_id: impl Into<String>,
        activity_template_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stage_id: stage_id.into(),
            activity_template_id: activity_template_id.into(),
            status: ActivityState::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            ActivityState::Failed => self
                .result
                .as_ref()
                .and_then(|r| r.get("error"))
                .and_then(Value::as_str),
            _ => None,
        }
    }
}
