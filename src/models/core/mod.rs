pub mod activity;
pub mod activity_template;
pub mod stage;
pub mod stage_template;
pub mod workflow;
pub mod workflow_request;
pub mod workflow_template;
