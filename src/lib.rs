#![allow(clippy::doc_markdown)] // Allow technical terms like JSONSchema, UUIDv7 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Workflow Engine Core
//!
//! A template-driven workflow orchestration engine.
//!
//! ## Overview
//!
//! A **Workflow Template** declares ordered **Stages**, each made of ordered
//! **Activities**. Starting a workflow validates and enriches the caller's
//! input against the template's JSON Schema, persists a running **Workflow**
//! whose context document holds that input, and materializes its first Stage.
//! Advancing a workflow executes the current Stage's Activities by looking up
//! each Activity's use-case code in the [`ExecutorRegistry`], binding request
//! parameters out of the context with path expressions, and folding results
//! back into the context.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - initializer, advancer, template cache, schema processing
//! - [`registry`] - executor trait, typed use-case adapter, executor registry
//! - [`repository`] - async persistence ports and the in-memory adapter
//! - [`cache`] - generic read-through cache with TTL and single-flight loads
//! - [`models`] - templates, run instances, request/response types
//! - [`state_machine`] - lifecycle states, events and transition rules
//! - [`context`] - request cancellation and deadlines
//! - [`config`] - layered engine configuration
//! - [`logging`] - structured logging bootstrap
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use workflow_engine::models::{ActivityTemplate, StageTemplate, WorkflowTemplate};
//! use workflow_engine::registry::{ExecutorRegistry, FnExecutor};
//! use workflow_engine::repository::InMemoryRepository;
//! use workflow_engine::{RequestContext, StartWorkflowRequest, WorkflowEngine};
//!
//! # async fn example() -> workflow_engine::Result<()> {
//! let repo = Arc::new(InMemoryRepository::new());
//! repo.upsert_workflow_template(WorkflowTemplate::new("onboarding", "Onboarding", "ws-1"));
//! repo.upsert_stage_template(StageTemplate::new("intake", "onboarding", 1, "Intake"));
//! repo.upsert_activity_template(
//!     ActivityTemplate::new("welcome", "intake", 1, "email.send")
//!         .with_binding("to", "input.email"),
//! );
//!
//! let registry = Arc::new(ExecutorRegistry::new());
//! registry.register(
//!     "email.send",
//!     Arc::new(FnExecutor::new("email", |_ctx, req| async move {
//!         Ok(json!({"sent_to": req["to"]}))
//!     })),
//! )?;
//!
//! let engine = WorkflowEngine::builder()
//!     .with_in_memory(repo)
//!     .with_registry(registry)
//!     .build()?;
//!
//! let ctx = RequestContext::new();
//! let started = engine
//!     .start_workflow(&ctx, StartWorkflowRequest::new("onboarding", r#"{"email": "a@b.c"}"#))
//!     .await?;
//! let outcome = engine.advance_workflow(&ctx, &started.workflow.id).await?;
//! assert!(outcome.is_completed());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod repository;
pub mod state_machine;

pub use config::{ConfigManager, EngineConfig, FailurePolicy};
pub use constants::{ActivityStatus, StageStatus, WorkflowStatus};
pub use context::RequestContext;
pub use error::{RepositoryError, Result, WorkflowError};
pub use models::{
    Activity, ActivityTemplate, Stage, StageTemplate, StartWorkflowRequest, StartWorkflowResponse,
    StartWorkflowWarning, Workflow, WorkflowTemplate,
};
pub use orchestration::{
    AdvanceOutcome, SchemaError, SchemaProcessor, SchemaViolation, TemplateCache,
    TemplateMutation, WorkflowEngine, WorkflowEngineBuilder,
};
pub use registry::{ActivityExecutor, DispatchError, ExecutionContext, ExecutorRegistry, UseCase};
