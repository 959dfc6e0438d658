use super::{
    errors::{invalid_transition, StateMachineResult},
    events::{ActivityEvent, StageEvent},
    states::{ActivityState, StageState},
};
use crate::models::{Activity, Stage};
use chrono::Utc;
use serde_json::json;
use tracing::debug;

/// Transition rules for stages: pending → in_progress → {completed, failed}
pub struct StageStateMachine;

impl StageStateMachine {
    pub fn determine_target_state(
        current_state: StageState,
        event: &StageEvent,
    ) -> StateMachineResult<StageState> {
        let target = match (current_state, event) {
            (StageState::Pending, StageEvent::Start) => StageState::InProgress,
            (StageState::InProgress, StageEvent::Complete) => StageState::Completed,
            (StageState::InProgress, StageEvent::Fail(_)) => StageState::Failed,
            (from_state, event) => {
                return Err(invalid_transition("stage", from_state, event.event_type()))
            }
        };

        Ok(target)
    }

    pub fn transition(stage: &mut Stage, event: StageEvent) -> StateMachineResult<StageState> {
        let from = stage.status;
        let target = Self::determine_target_state(from, &event)?;
        stage.status = target;
        stage.updated_at = Utc::now();

        debug!(
            stage_id = %stage.id,
            from_state = %from,
            to_state = %target,
            event = event.event_type(),
            "Stage transitioned"
        );

        Ok(target)
    }
}

/// Transition rules for activities: pending → in_progress → {completed, failed}.
///
/// A pending activity may also fail directly, which covers bindings that cannot
/// be resolved before the executor is ever invoked.
pub struct ActivityStateMachine;

impl ActivityStateMachine {
    pub fn determine_target_state(
        current_state: ActivityState,
        event: &ActivityEvent,
    ) -> StateMachineResult<ActivityState> {
        let target = match (current_state, event) {
            (ActivityState::Pending, ActivityEvent::Start) => ActivityState::InProgress,
            (ActivityState::InProgress, ActivityEvent::Complete(_)) => ActivityState::Completed,
            (ActivityState::InProgress, ActivityEvent::Fail(_)) => ActivityState::Failed,
            (ActivityState::Pending, ActivityEvent::Fail(_)) => ActivityState::Failed,
            (from_state, event) => {
                return Err(invalid_transition(
                    "activity",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    pub fn transition(
        activity: &mut Activity,
        event: ActivityEvent,
    ) -> StateMachineResult<ActivityState> {
        let from = activity.status;
        let target = Self::determine_target_state(from, &event)?;

        match &event {
            ActivityEvent::Complete(results) => activity.result = Some(results.clone()),
            ActivityEvent::Fail(message) => activity.result = Some(json!({ "error": message })),
            ActivityEvent::Start => {}
        }
        activity.status = target;
        activity.updated_at = Utc::now();

        debug!(
            activity_id = %activity.id,
            from_state = %from,
            to_state = %target,
            event = event.event_type(),
            "Activity transitioned"
        );

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lifecycle() {
        let mut stage = Stage::pending("st-1", "wf-1", "S1");
        assert_eq!(
            StageStateMachine::transition(&mut stage, StageEvent::Start).unwrap(),
            StageState::InProgress
        );
        assert_eq!(
            StageStateMachine::transition(&mut stage, StageEvent::Complete).unwrap(),
            StageState::Completed
        );
        assert!(StageStateMachine::transition(&mut stage, StageEvent::Start).is_err());
    }

    #[test]
    fn test_stage_cannot_complete_from_pending() {
        assert!(
            StageStateMachine::determine_target_state(StageState::Pending, &StageEvent::Complete)
                .is_err()
        );
    }

    #[test]
    fn test_activity_records_results_and_errors() {
        let mut ok = Activity::pending("a-1", "st-1", "A1");
        ActivityStateMachine::transition(&mut ok, ActivityEvent::Start).unwrap();
        ActivityStateMachine::transition(&mut ok, ActivityEvent::Complete(json!({"n": 1})))
            .unwrap();
        assert_eq!(ok.status, ActivityState::Completed);
        assert_eq!(ok.result, Some(json!({"n": 1})));

        let mut failed = Activity::pending("a-2", "st-1", "A2");
        ActivityStateMachine::transition(&mut failed, ActivityEvent::fail_with_error("no such path"))
            .unwrap();
        assert_eq!(failed.status, ActivityState::Failed);
        assert_eq!(failed.error_message(), Some("no such path"));
    }

    #[test]
    fn test_completed_activity_is_terminal() {
        assert!(ActivityStateMachine::determine_target_state(
            ActivityState::Completed,
            &ActivityEvent::Start
        )
        .is_err());
    }
}
