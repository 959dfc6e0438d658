//! # Activity Executors
//!
//! The execution contract the engine dispatches Activities to. Business
//! operations are written as [`UseCase`]s with typed request/response structs
//! and adapted to the JSON boundary by [`UseCaseExecutor`]; quick integrations
//! can use [`FnExecutor`] with a closure.

use super::errors::{DispatchError, DispatchResult};
use crate::context::RequestContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of the Activity being executed, handed to every executor call
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request: RequestContext,
    pub workflow_id: String,
    pub stage_id: String,
    pub activity_id: String,
    pub activity_template_id: String,
    pub use_case_code: String,
    pub workspace_id: String,
}

/// Execution trait for registered use cases.
///
/// Panics inside `execute` are caught by the advancer and recorded as
/// [`DispatchError::Panicked`] on the Activity.
#[async_trait]
pub trait ActivityExecutor: Send + Sync + 'static {
    async fn execute(&self, ctx: &ExecutionContext, request: Value) -> DispatchResult<Value>;

    /// Executor name for logging
    fn name(&self) -> &str;
}

/// A typed business operation.
#[async_trait]
pub trait UseCase: Send + Sync + 'static {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        request: Self::Request,
    ) -> Result<Self::Response, String>;
}

/// Adapts a [`UseCase`] to the JSON executor boundary
pub struct UseCaseExecutor<U> {
    code: String,
    use_case: U,
}

impl<U: UseCase> UseCaseExecutor<U> {
    pub fn new(code: impl Into<String>, use_case: U) -> Self {
        Self {
            code: code.into(),
            use_case,
        }
    }
}

impl<U> fmt::Debug for UseCaseExecutor<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseCaseExecutor")
            .field("code", &self.code)
            .finish()
    }
}

#[async_trait]
impl<U: UseCase> ActivityExecutor for UseCaseExecutor<U> {
    async fn execute(&self, ctx: &ExecutionContext, request: Value) -> DispatchResult<Value> {
        let typed: U::Request =
            serde_json::from_value(request).map_err(|e| DispatchError::InvalidRequest {
                code: self.code.clone(),
                reason: e.to_string(),
            })?;

        let response = self
            .use_case
            .execute(ctx, typed)
            .await
            .map_err(|reason| DispatchError::execution(&self.code, reason))?;

        serde_json::to_value(response).map_err(|e| {
            DispatchError::execution(&self.code, format!("response not serializable: {e}"))
        })
    }

    fn name(&self) -> &str {
        &self.code
    }
}

type ExecutorFn =
    dyn Fn(ExecutionContext, Value) -> BoxFuture<'static, DispatchResult<Value>> + Send + Sync;

/// Closure-backed executor
pub struct FnExecutor {
    name: String,
    func: Box<ExecutorFn>,
}

impl FnExecutor {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ExecutionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = DispatchResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |ctx, request| Box::pin(func(ctx, request))),
        }
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl ActivityExecutor for FnExecutor {
    async fn execute(&self, ctx: &ExecutionContext, request: Value) -> DispatchResult<Value> {
        (self.func)(ctx.clone(), request).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
