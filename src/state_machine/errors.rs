use thiserror::Error;

/// Error raised when an event is not valid for an entity's current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid {entity} transition from {from} on event {event}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },

    #[error("{entity} {id} is in terminal state {state}")]
    AlreadyTerminal {
        entity: &'static str,
        id: String,
        state: String,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

pub(crate) fn invalid_transition(
    entity: &'static str,
    from: impl ToString,
    event: &'static str,
) -> StateMachineError {
    StateMachineError::InvalidTransition {
        entity,
        from: from.to_string(),
        event: event.to_string(),
    }
}
