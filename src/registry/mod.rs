//! # Registry
//!
//! Use-case executors and the name-keyed registry the stage advancer
//! dispatches Activities through.

pub mod errors;
pub mod executor;
pub mod executor_registry;

pub use errors::{DispatchError, DispatchResult};
pub use executor::{ActivityExecutor, ExecutionContext, FnExecutor, UseCase, UseCaseExecutor};
pub use executor_registry::ExecutorRegistry;
