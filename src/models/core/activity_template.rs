use super::stage_template::Ordered;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative unit of work inside a stage template.
///
/// An activity template is pure data: the `use_case_code` names an executor in
/// the [`ExecutorRegistry`](crate::registry::ExecutorRegistry) and each entry
/// in `parameter_bindings` maps a request field to a path expression evaluated
/// against the workflow's context document (for example `input.client_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTemplate {
    pub id: String,
    pub stage_template_id: String,
    pub order_index: i32,
    pub name: String,
    pub use_case_code: String,
    #[serde(default)]
    pub parameter_bindings: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityTemplate {
    pub fn new(
        id: impl Into<String>,
        stage_template_id: impl Into<String>,
        order_index: i32,
        use_case_code: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            stage_template_id: stage_template_id.into(),
            order_index,
            use_case_code: use_case_code.into(),
            parameter_bindings: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_binding(mut self, parameter: impl Into<String>, path: impl Into<String>) -> Self {
        self.parameter_bindings.insert(parameter.into(), path.into());
        self
    }
}

impl Ordered for ActivityTemplate {
    fn order_index(&self) -> i32 {
        self.order_index
    }

    fn order_id(&self) -> &str {
        &self.id
    }
}
