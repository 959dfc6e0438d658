use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Initial state: the workflow has been instantiated and may advance
    #[default]
    InProgress,
    /// Every stage completed
    Completed,
    /// A stage failed
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl WorkflowState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid workflow state: {s}")),
        }
    }
}

/// Stage run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Materialized but not yet started
    #[default]
    Pending,
    /// Activities are being executed
    InProgress,
    /// All activities completed
    Completed,
    /// At least one activity failed
    Failed,
}

impl StageState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for StageState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid stage state: {s}")),
        }
    }
}

/// Activity run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ActivityState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ActivityState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid activity state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_state_terminal_check() {
        assert!(WorkflowState::Completed.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(WorkflowState::Cancelled.is_terminal());
        assert!(!WorkflowState::InProgress.is_terminal());
    }

    #[test]
    fn test_stage_and_activity_defaults_are_pending() {
        assert_eq!(StageState::default(), StageState::Pending);
        assert_eq!(ActivityState::default(), ActivityState::Pending);
        assert_eq!(WorkflowState::default(), WorkflowState::InProgress);
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(WorkflowState::InProgress.to_string(), "in_progress");
        assert_eq!(
            "cancelled".parse::<WorkflowState>().unwrap(),
            WorkflowState::Cancelled
        );
        assert_eq!(StageState::Failed.to_string(), "failed");
        assert!("complete".parse::<StageState>().is_err());
        assert_eq!(
            "in_progress".parse::<ActivityState>().unwrap(),
            ActivityState::InProgress
        );
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&WorkflowState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: StageState = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, StageState::Pending);
    }
}
