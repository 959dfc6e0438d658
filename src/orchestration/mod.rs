//! # Orchestration
//!
//! Workflow instantiation and advancement.
//!
//! ## Core Components
//!
//! - **TemplateCache**: read-through cache over the template repositories
//! - **SchemaProcessor**: draft-07 validation and default enrichment of caller input
//! - **WorkflowInitializer**: template + input → persisted Workflow and first pending Stage
//! - **StageAdvancer**: executes the current Stage's Activities through the executor registry
//! - **WorkflowEngine**: the assembled façade callers use

pub mod engine;
pub mod id_generator;
pub mod parameter_binding;
pub mod schema_processor;
pub mod stage_advancer;
pub mod template_cache;
pub mod workflow_initializer;

pub use engine::{Repositories, WorkflowEngine, WorkflowEngineBuilder};
pub use id_generator::{IdGenerator, UuidV7Generator};
pub use parameter_binding::{bind_parameters, BindingError, PathExpression, PathSegment};
pub use schema_processor::{SchemaError, SchemaProcessor, SchemaViolation};
pub use stage_advancer::{AdvanceOutcome, StageAdvancer};
pub use template_cache::{TemplateCache, TemplateCacheStats, TemplateMutation};
pub use workflow_initializer::WorkflowInitializer;
