// State machines for workflow, stage and activity lifecycles.
//
// Transitions are pure functions over the run models; persistence of the
// resulting state is the caller's job (see orchestration::stage_advancer).

pub mod errors;
pub mod events;
pub mod stage_state_machine;
pub mod states;
pub mod workflow_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{ActivityEvent, StageEvent, WorkflowEvent};
pub use stage_state_machine::{ActivityStateMachine, StageStateMachine};
pub use states::{ActivityState, StageState, WorkflowState};
pub use workflow_state_machine::WorkflowStateMachine;
