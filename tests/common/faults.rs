//! Repository wrappers that inject failures, latency and call counting.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use workflow_engine::models::{
    ActivityTemplate, Stage, StageTemplate, Workflow, WorkflowTemplate,
};
use workflow_engine::repository::{
    ActivityTemplateRepository, InMemoryRepository, StageRepository, StageTemplateRepository,
    WorkflowRepository, WorkflowTemplateRepository,
};
use workflow_engine::error::{RepositoryError, RepositoryResult};
use workflow_engine::RequestContext;

/// Stage store whose writes always fail
pub struct FailingStageRepository {
    pub inner: Arc<InMemoryRepository>,
}

#[async_trait]
impl StageRepository for FailingStageRepository {
    async fn create(&self, _ctx: &RequestContext, _stage: &Stage) -> RepositoryResult<()> {
        Err(RepositoryError::persistence("stage store unavailable"))
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Stage> {
        StageRepository::get(&*self.inner, ctx, id).await
    }

    async fn update(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()> {
        StageRepository::update(&*self.inner, ctx, stage).await
    }

    async fn list_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: &str,
    ) -> RepositoryResult<Vec<Stage>> {
        self.inner.list_by_workflow(ctx, workflow_id).await
    }
}

/// Stage store whose creates take `delay` before reaching the inner store
pub struct SlowStageRepository {
    pub inner: Arc<InMemoryRepository>,
    pub delay: Duration,
}

#[async_trait]
impl StageRepository for SlowStageRepository {
    async fn create(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()> {
        tokio::time::sleep(self.delay).await;
        StageRepository::create(&*self.inner, ctx, stage).await
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Stage> {
        StageRepository::get(&*self.inner, ctx, id).await
    }

    async fn update(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()> {
        StageRepository::update(&*self.inner, ctx, stage).await
    }

    async fn list_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: &str,
    ) -> RepositoryResult<Vec<Stage>> {
        self.inner.list_by_workflow(ctx, workflow_id).await
    }
}

/// Template store that counts reads and can delay them
pub struct CountingTemplateRepository {
    pub inner: Arc<InMemoryRepository>,
    pub template_reads: AtomicUsize,
    pub stage_list_reads: AtomicUsize,
    pub activity_list_reads: AtomicUsize,
    pub delay: Option<Duration>,
}

impl CountingTemplateRepository {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            template_reads: AtomicUsize::new(0),
            stage_list_reads: AtomicUsize::new(0),
            activity_list_reads: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn template_reads(&self) -> usize {
        self.template_reads.load(Ordering::SeqCst)
    }

    pub fn stage_list_reads(&self) -> usize {
        self.stage_list_reads.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WorkflowTemplateRepository for CountingTemplateRepository {
    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<WorkflowTemplate> {
        self.template_reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        WorkflowTemplateRepository::get(&*self.inner, ctx, id).await
    }

    async fn list(&self, ctx: &RequestContext) -> RepositoryResult<Vec<WorkflowTemplate>> {
        self.inner.list(ctx).await
    }
}

#[async_trait]
impl StageTemplateRepository for CountingTemplateRepository {
    async fn list_by_workflow_template(
        &self,
        ctx: &RequestContext,
        workflow_template_id: &str,
    ) -> RepositoryResult<Vec<StageTemplate>> {
        self.stage_list_reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.inner
            .list_by_workflow_template(ctx, workflow_template_id)
            .await
    }
}

#[async_trait]
impl ActivityTemplateRepository for CountingTemplateRepository {
    async fn list_by_stage_template(
        &self,
        ctx: &RequestContext,
        stage_template_id: &str,
    ) -> RepositoryResult<Vec<ActivityTemplate>> {
        self.activity_list_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_by_stage_template(ctx, stage_template_id).await
    }
}

/// Workflow store whose creates take `delay` before reaching the inner store
pub struct SlowWorkflowRepository {
    pub inner: Arc<InMemoryRepository>,
    pub delay: Duration,
}

#[async_trait]
impl WorkflowRepository for SlowWorkflowRepository {
    async fn create(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()> {
        tokio::time::sleep(self.delay).await;
        WorkflowRepository::create(&*self.inner, ctx, workflow).await
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Workflow> {
        WorkflowRepository::get(&*self.inner, ctx, id).await
    }

    async fn update(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()> {
        WorkflowRepository::update(&*self.inner, ctx, workflow).await
    }

    async fn list_by_template(
        &self,
        ctx: &RequestContext,
        template_id: &str,
    ) -> RepositoryResult<Vec<Workflow>> {
        self.inner.list_by_template(ctx, template_id).await
    }
}
