//! Error types for the workflow engine.
//!

use crate::orchestration::schema_processor::SchemaError;
use crate::registry::errors::DispatchError;
use crate::state_machine::errors::StateMachineError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("Schema validation error: {0}")]
    SchemaValidation(#[from] SchemaError),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Errors the caller caused and should not retry unchanged
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::SchemaValidation(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The caller cancelled or ran out of time; the backing store did not fail
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::DeadlineExceeded(_))
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(error: serde_json::Error) -> Self {
        WorkflowError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Failures reported by repository ports.
///
/// Adapters must keep "record absent" distinct from transport or storage
/// failures; the engine surfaces the first as `NotFound` and the second as
/// `Persistence`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("{entity} already exists: {id}")]
    Conflict { entity: String, id: String },
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Repository call cancelled: {0}")]
    Cancelled(String),
    #[error("Repository call exceeded deadline: {0}")]
    DeadlineExceeded(String),
}

impl RepositoryError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence(reason.into())
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

impl From<RepositoryError> for WorkflowError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            RepositoryError::Conflict { entity, id } => {
                WorkflowError::Persistence(format!("{entity} already exists: {id}"))
            }
            RepositoryError::Persistence(reason) => WorkflowError::Persistence(reason),
            RepositoryError::Cancelled(reason) => WorkflowError::Cancelled(reason),
            RepositoryError::DeadlineExceeded(reason) => WorkflowError::DeadlineExceeded(reason),
        }
    }
}
