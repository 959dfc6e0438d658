//! # System Constants
//!
//! Context-document keys, lifecycle event names and defaults shared across the
//! engine. Status enums live in [`crate::state_machine`] and are re-exported
//! here under their status names.

pub use crate::state_machine::{
    ActivityState as ActivityStatus, StageState as StageStatus, WorkflowState as WorkflowStatus,
};

/// Keys used inside a workflow's context document
pub mod context_keys {
    /// Root key holding the validated and enriched caller input
    pub const INPUT: &str = "input";
    /// Root key under which activity results are folded, keyed by activity template id
    pub const ACTIVITIES: &str = "activities";
}

/// Lifecycle event names used in structured logs
pub mod events {
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";
    pub const WORKFLOW_DEGRADED: &str = "workflow.degraded";

    pub const STAGE_MATERIALIZED: &str = "stage.materialized";
    pub const STAGE_STARTED: &str = "stage.started";
    pub const STAGE_COMPLETED: &str = "stage.completed";
    pub const STAGE_FAILED: &str = "stage.failed";

    pub const ACTIVITY_COMPLETED: &str = "activity.completed";
    pub const ACTIVITY_FAILED: &str = "activity.failed";

    pub const EXECUTOR_REGISTERED: &str = "executor.registered";
    pub const EXECUTOR_REPLACED: &str = "executor.replaced";
    pub const EXECUTOR_UNREGISTERED: &str = "executor.unregistered";
}

/// Entity names used in not-found and persistence diagnostics
pub mod entities {
    pub const WORKFLOW_TEMPLATE: &str = "WorkflowTemplate";
    pub const STAGE_TEMPLATE: &str = "StageTemplate";
    pub const ACTIVITY_TEMPLATE: &str = "ActivityTemplate";
    pub const WORKFLOW: &str = "Workflow";
    pub const STAGE: &str = "Stage";
    pub const ACTIVITY: &str = "Activity";
}

/// Defaults applied when configuration does not override them
pub mod defaults {
    pub const CACHE_TTL_SECONDS: u64 = 300;
    pub const CACHE_MAX_ENTRIES: usize = 1000;
    pub const ACTIVITY_TIMEOUT_MS: u64 = 30_000;
    pub const DISPLAY_NAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
    pub const ENVIRONMENT: &str = "development";
}
