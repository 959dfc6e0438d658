//! # Models
//!
//! Templates (read-mostly definitions) and run instances created from them.

pub mod core;

pub use self::core::activity::Activity;
pub use self::core::activity_template::ActivityTemplate;
pub use self::core::stage::Stage;
pub use self::core::stage_template::{sort_by_order, Ordered, StageTemplate};
pub use self::core::workflow::{NewWorkflow, Workflow};
pub use self::core::workflow_request::{
    StartWorkflowRequest, StartWorkflowResponse, StartWorkflowWarning,
};
pub use self::core::workflow_template::WorkflowTemplate;
