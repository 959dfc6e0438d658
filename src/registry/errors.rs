use thiserror::Error;

/// Activity-scoped dispatch failures.
///
/// None of these abort the engine; the advancer records them on the failed
/// Activity and applies the configured failure policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("No executor registered for use case '{code}'")]
    NotRegistered { code: String },

    #[error("Cannot bind parameter '{parameter}' from '{path}': {reason}")]
    Binding {
        parameter: String,
        path: String,
        reason: String,
    },

    #[error("Request for use case '{code}' is invalid: {reason}")]
    InvalidRequest { code: String, reason: String },

    #[error("Use case '{code}' failed: {reason}")]
    Execution { code: String, reason: String },

    #[error("Use case '{code}' timed out after {timeout_ms}ms")]
    Timeout { code: String, timeout_ms: u64 },

    #[error("Use case '{code}' panicked")]
    Panicked { code: String },

    #[error("Executor registry is frozen; cannot register '{code}'")]
    RegistryFrozen { code: String },
}

impl DispatchError {
    pub fn execution(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            code: code.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, stored alongside the error message
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => "not_registered",
            Self::Binding { .. } => "binding",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Execution { .. } => "execution",
            Self::Timeout { .. } => "timeout",
            Self::Panicked { .. } => "panicked",
            Self::RegistryFrozen { .. } => "registry_frozen",
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
