//! # Executor Registry
//!
//! String-keyed map from use-case code to [`ActivityExecutor`]. Populated
//! explicitly at process start, then frozen once the engine is built so the
//! set of dispatchable use cases cannot change underneath running workflows.

use super::errors::{DispatchError, DispatchResult};
use super::executor::{ActivityExecutor, UseCase, UseCaseExecutor};
use crate::constants::events;
use crate::error::{Result, WorkflowError};
use crate::logging::log_registry_operation;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn ActivityExecutor>>>,
    frozen: AtomicBool,
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("registered_codes", &self.registered_codes())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Register an executor under `code`.
    ///
    /// Registering an existing code replaces the previous executor and logs a
    /// warning. Fails for an empty code or once the registry is frozen.
    pub fn register(&self, code: &str, executor: Arc<dyn ActivityExecutor>) -> Result<()> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(WorkflowError::Validation(
                "use case code must not be empty".to_string(),
            ));
        }
        if self.is_frozen() {
            return Err(DispatchError::RegistryFrozen {
                code: code.to_string(),
            }
            .into());
        }

        let previous = self
            .executors
            .write()
            .insert(code.to_string(), Arc::clone(&executor));

        match previous {
            Some(old) => {
                warn!(
                    use_case_code = code,
                    previous_executor = old.name(),
                    executor = executor.name(),
                    "Replacing existing executor registration"
                );
                log_registry_operation(events::EXECUTOR_REPLACED, code, Some(executor.name()));
            }
            None => log_registry_operation(events::EXECUTOR_REGISTERED, code, Some(executor.name())),
        }

        Ok(())
    }

    /// Register a typed use case, wrapping it in a [`UseCaseExecutor`]
    pub fn register_use_case<U: UseCase>(&self, code: &str, use_case: U) -> Result<()> {
        self.register(code, Arc::new(UseCaseExecutor::new(normalize_code(code), use_case)))
    }

    /// Look up the executor for `code`. Surrounding whitespace is ignored, as in [`Self::register`].
    pub fn resolve(&self, code: &str) -> DispatchResult<Arc<dyn ActivityExecutor>> {
        let code = normalize_code(code);
        let executor = self.executors.read().get(code).cloned();
        executor.ok_or_else(|| {
            debug!(use_case_code = code, "No executor registered");
            DispatchError::NotRegistered {
                code: code.to_string(),
            }
        })
    }

    pub fn unregister(&self, code: &str) -> Result<bool> {
        let code = normalize_code(code);
        if self.is_frozen() {
            return Err(DispatchError::RegistryFrozen {
                code: code.to_string(),
            }
            .into());
        }
        let removed = self.executors.write().remove(code).is_some();
        if removed {
            log_registry_operation(events::EXECUTOR_UNREGISTERED, code, None);
        }
        Ok(removed)
    }

    pub fn is_registered(&self, code: &str) -> bool {
        self.executors.read().contains_key(normalize_code(code))
    }

    /// Registered codes, sorted
    pub fn registered_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.executors.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.read().is_empty()
    }

    /// Reject all further registration changes
    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            debug!(executors = self.len(), "Executor registry frozen");
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

/// Codes are matched without surrounding whitespace
fn normalize_code(code: &str) -> &str {
    code.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::executor::test_support::execution_context;
    use crate::registry::FnExecutor;
    use serde_json::json;

    fn constant(name: &str, value: i64) -> Arc<dyn ActivityExecutor> {
        Arc::new(FnExecutor::new(name, move |_, _| async move {
            Ok(json!(value))
        }))
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = ExecutorRegistry::new();
        registry.register("billing.charge", constant("charge", 1)).unwrap();

        let executor = registry.resolve("billing.charge").unwrap();
        let result = executor
            .execute(&execution_context("billing.charge"), json!({}))
            .await
            .unwrap();
        assert_eq!(result, json!(1));
        assert!(registry.is_registered("billing.charge"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_code_is_not_registered() {
        let registry = ExecutorRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert_eq!(
            err,
            DispatchError::NotRegistered {
                code: "nope".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let registry = ExecutorRegistry::new();
        registry.register("code", constant("first", 1)).unwrap();
        registry.register("code", constant("second", 2)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("code").unwrap().name(), "second");
    }

    #[tokio::test]
    async fn test_codes_match_regardless_of_surrounding_whitespace() {
        let registry = ExecutorRegistry::new();
        registry
            .register(" invoice.create ", constant("invoice", 3))
            .unwrap();

        assert!(registry.resolve(" invoice.create ").is_ok());
        assert!(registry.resolve("invoice.create\t").is_ok());
        assert!(registry.is_registered(" invoice.create"));
        assert_eq!(registry.registered_codes(), vec!["invoice.create".to_string()]);

        let executor = registry.resolve("invoice.create").unwrap();
        let result = executor
            .execute(&execution_context("invoice.create"), json!({}))
            .await
            .unwrap();
        assert_eq!(result, json!(3));

        assert!(registry.unregister("  invoice.create  ").unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_code_rejected() {
        let registry = ExecutorRegistry::new();
        let err = registry.register("  ", constant("x", 0)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_frozen_registry_rejects_changes() {
        let registry = ExecutorRegistry::new();
        registry.register("a", constant("a", 1)).unwrap();
        registry.freeze();

        let err = registry.register("b", constant("b", 2)).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Dispatch(DispatchError::RegistryFrozen { .. })
        ));
        assert!(registry.unregister("a").is_err());
        assert_eq!(registry.registered_codes(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unregister() {
        let registry = ExecutorRegistry::new();
        registry.register("a", constant("a", 1)).unwrap();
        assert!(registry.unregister("a").unwrap());
        assert!(!registry.unregister("a").unwrap());
        assert!(!registry.is_registered("a"));
    }
}
