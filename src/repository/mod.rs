//! # Repository Ports
//!
//! Async persistence interfaces the engine depends on. Every call receives the
//! caller's [`RequestContext`] so adapters can honour cancellation and
//! deadlines; the engine additionally wraps each call in
//! [`RequestContext::run`].
//!
//! Adapters must report an absent record as [`RepositoryError::NotFound`] and
//! reserve [`RepositoryError::Persistence`] for storage failures.

pub mod in_memory;

use crate::context::RequestContext;
use crate::error::RepositoryResult;
use crate::models::{
    Activity, ActivityTemplate, Stage, StageTemplate, Workflow, WorkflowTemplate,
};
use async_trait::async_trait;

pub use in_memory::InMemoryRepository;

#[async_trait]
pub trait WorkflowTemplateRepository: Send + Sync {
    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<WorkflowTemplate>;

    async fn list(&self, ctx: &RequestContext) -> RepositoryResult<Vec<WorkflowTemplate>>;
}

#[async_trait]
pub trait StageTemplateRepository: Send + Sync {
    /// Stage templates owned by a workflow template, in storage order.
    /// An empty list is a valid answer.
    async fn list_by_workflow_template(
        &self,
        ctx: &RequestContext,
        workflow_template_id: &str,
    ) -> RepositoryResult<Vec<StageTemplate>>;
}

#[async_trait]
pub trait ActivityTemplateRepository: Send + Sync {
    async fn list_by_stage_template(
        &self,
        ctx: &RequestContext,
        stage_template_id: &str,
    ) -> RepositoryResult<Vec<ActivityTemplate>>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()>;

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Workflow>;

    async fn update(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()>;

    async fn list_by_template(
        &self,
        ctx: &RequestContext,
        template_id: &str,
    ) -> RepositoryResult<Vec<Workflow>>;
}

#[async_trait]
pub trait StageRepository: Send + Sync {
    async fn create(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()>;

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Stage>;

    async fn update(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()>;

    async fn list_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: &str,
    ) -> RepositoryResult<Vec<Stage>>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn create(&self, ctx: &RequestContext, activity: &Activity) -> RepositoryResult<()>;

    async fn update(&self, ctx: &RequestContext, activity: &Activity) -> RepositoryResult<()>;

    async fn list_by_stage(
        &self,
        ctx: &RequestContext,
        stage_id: &str,
    ) -> RepositoryResult<Vec<Activity>>;
}

/// An open unit of work. Dropping without `commit` must behave as `rollback`.
#[async_trait]
pub trait Transaction: Send {
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}

/// Optional transaction support. The engine works without one.
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn begin(&self, ctx: &RequestContext) -> RepositoryResult<Box<dyn Transaction>>;
}
