//! # Workflow Template
//!
//! Reusable definition of a business process: a name, an optional JSON Schema
//! for caller input, and the workspace it belongs to. Stages hang off the
//! template through [`StageTemplate`](super::stage_template::StageTemplate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema (draft-07) applied to caller input at instantiation
    pub input_schema: Option<Value>,
    pub workspace_id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            input_schema: None,
            workspace_id: workspace_id.into(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn has_input_schema(&self) -> bool {
        self.input_schema.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_builder() {
        let template = WorkflowTemplate::new("T1", "Onboarding", "ws-1")
            .with_description("Client onboarding")
            .with_input_schema(json!({"type": "object"}))
            .with_version(3);

        assert_eq!(template.id, "T1");
        assert_eq!(template.workspace_id, "ws-1");
        assert_eq!(template.version, 3);
        assert!(template.has_input_schema());
    }
}
