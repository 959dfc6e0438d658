use crate::state_machine::StageState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A materialized phase of a workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub workflow_id: String,
    pub stage_template_id: String,
    pub status: StageState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    /// A freshly materialized stage always starts `pending`
    pub fn pending(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        stage_template_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            stage_template_id: stage_template_id.into(),
            status: StageState::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
