//! # Workflow
//!
//! One run of a [`WorkflowTemplate`](super::workflow_template::WorkflowTemplate).
//!
//! The context document is always a JSON object whose `"input"` key holds the
//! validated caller input. Activity results accumulate under `"activities"`,
//! keyed by activity template id, so path expressions such as
//! `input.client_id` or `activities.create_invoice.total` stay stable for the
//! lifetime of the run.

use crate::constants::context_keys;
use crate::state_machine::WorkflowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub context: Value,
    /// Index into the template's sorted stage templates; starts at 0 and only grows
    pub current_stage_index: u32,
    pub status: WorkflowState,
    pub active: bool,
    pub workspace_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the instantiator supplies for a new workflow
#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub id: String,
    pub template_id: String,
    pub name: String,
    pub input: Value,
    pub workspace_id: String,
    pub created_at: DateTime<Utc>,
}

impl NewWorkflow {
    pub fn into_workflow(self) -> Workflow {
        Workflow {
            id: self.id,
            template_id: self.template_id,
            name: self.name,
            context: Workflow::context_from_input(self.input),
            current_stage_index: 0,
            status: WorkflowState::InProgress,
            active: true,
            workspace_id: self.workspace_id,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

impl Workflow {
    /// Wrap finalized input as `{"input": input}`
    pub fn context_from_input(input: Value) -> Value {
        let mut context = Map::new();
        context.insert(context_keys::INPUT.to_string(), input);
        Value::Object(context)
    }

    pub fn input(&self) -> Option<&Value> {
        self.context.get(context_keys::INPUT)
    }

    pub fn activity_result(&self, activity_template_id: &str) -> Option<&Value> {
        self.context
            .get(context_keys::ACTIVITIES)
            .and_then(|results| results.get(activity_template_id))
    }

    /// Fold an activity's response into the context under
    /// `activities.<activity_template_id>`, replacing any earlier value.
    pub fn record_activity_result(&mut self, activity_template_id: &str, result: Value) {
        if !self.context.is_object() {
            let input = self.context.take();
            self.context = Self::context_from_input(input);
        }

        if let Value::Object(context) = &mut self.context {
            let results = context
                .entry(context_keys::ACTIVITIES.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !results.is_object() {
                *results = Value::Object(Map::new());
            }
            if let Value::Object(results) = results {
                results.insert(activity_template_id.to_string(), result);
            }
        }
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
