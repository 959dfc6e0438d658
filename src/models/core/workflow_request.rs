//! Request and response shapes for starting a workflow.

use super::stage::Stage;
use super::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller request to instantiate a workflow template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub template_id: String,
    /// Raw JSON input; an empty string is treated as `{}`
    #[serde(default)]
    pub input_json: String,
    /// Overrides the display name generated from the template name and start time
    #[serde(default)]
    pub display_name: Option<String>,
}

impl StartWorkflowRequest {
    pub fn new(template_id: impl Into<String>, input_json: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            input_json: input_json.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Non-fatal conditions observed while starting a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartWorkflowWarning {
    /// The workflow was created but its first stage could not be persisted
    InitialStageNotCreated {
        stage_template_id: String,
        reason: String,
    },
    /// The stage template list could not be read after the workflow was created
    StageTemplatesUnavailable { reason: String },
    /// The caller cancelled or hit its deadline before the first stage was
    /// persisted. `stage_template_id` is absent when the interruption came
    /// while the stage templates were still being resolved.
    InitialStageInterrupted {
        stage_template_id: Option<String>,
        reason: String,
    },
}

impl StartWorkflowWarning {
    /// True when the caller gave up, as opposed to a storage fault
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::InitialStageInterrupted { .. })
    }
}

impl fmt::Display for StartWorkflowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialStageNotCreated {
                stage_template_id,
                reason,
            } => write!(
                f,
                "initial stage for template {stage_template_id} was not created: {reason}"
            ),
            Self::StageTemplatesUnavailable { reason } => {
                write!(f, "stage templates could not be resolved: {reason}")
            }
            Self::InitialStageInterrupted {
                stage_template_id: Some(stage_template_id),
                reason,
            } => write!(
                f,
                "initial stage for template {stage_template_id} abandoned by the caller: {reason}"
            ),
            Self::InitialStageInterrupted {
                stage_template_id: None,
                reason,
            } => write!(f, "initial stage abandoned by the caller: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow: Workflow,
    /// The pending first stage, when the template defines one and it was persisted
    pub initial_stage: Option<Stage>,
    pub success: bool,
    pub warnings: Vec<StartWorkflowWarning>,
}

impl StartWorkflowResponse {
    /// True when the workflow exists but a secondary write failed
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
