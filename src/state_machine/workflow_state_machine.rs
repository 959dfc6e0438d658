use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::WorkflowEvent,
    states::WorkflowState,
};
use crate::models::Workflow;
use tracing::debug;

/// Transition rules for workflow runs.
///
/// `in_progress` is the only non-terminal state; every event moves the
/// workflow into a terminal state and clears its `active` flag.
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    pub fn determine_target_state(
        current_state: WorkflowState,
        event: &WorkflowEvent,
    ) -> StateMachineResult<WorkflowState> {
        let target = match (current_state, event) {
            (WorkflowState::InProgress, WorkflowEvent::Complete) => WorkflowState::Completed,
            (WorkflowState::InProgress, WorkflowEvent::Fail(_)) => WorkflowState::Failed,
            (WorkflowState::InProgress, WorkflowEvent::Cancel) => WorkflowState::Cancelled,
            (from_state, event) => {
                return Err(invalid_transition(
                    "workflow",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Apply `event` to `workflow`, updating status, `active` and `updated_at`
    pub fn transition(
        workflow: &mut Workflow,
        event: WorkflowEvent,
    ) -> StateMachineResult<WorkflowState> {
        if workflow.status.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                entity: "workflow",
                id: workflow.id.clone(),
                state: workflow.status.to_string(),
            });
        }

        let from = workflow.status;
        let target = Self::determine_target_state(from, &event)?;
        workflow.status = target;
        workflow.active = !target.is_terminal();
        workflow.touch();

        debug!(
            workflow_id = %workflow.id,
            from_state = %from,
            to_state = %target,
            event = event.event_type(),
            "Workflow transitioned"
        );

        Ok(target)
    }
}
