use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that can trigger workflow state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// The final stage completed
    Complete,
    /// A stage failed with the given reason
    Fail(String),
    /// A caller cancelled the workflow
    Cancel,
}

impl WorkflowEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Events that can trigger stage state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StageEvent {
    Start,
    Complete,
    Fail(String),
}

impl StageEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
        }
    }
}

/// Events that can trigger activity state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ActivityEvent {
    /// Start executing the bound operation
    Start,
    /// Mark complete with the executor's response
    Complete(Value),
    /// Mark failed with an error message
    Fail(String),
}

impl ActivityEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract results if this is a completion event
    pub fn results(&self) -> Option<&Value> {
        match self {
            Self::Complete(results) => Some(results),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
