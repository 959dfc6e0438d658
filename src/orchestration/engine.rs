//! # Workflow Engine
//!
//! Entry point bundling the template cache, schema processor, id generator,
//! repositories and executor registry behind the public workflow operations.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workflow_engine::{RequestContext, StartWorkflowRequest, WorkflowEngine};
//! use workflow_engine::repository::InMemoryRepository;
//!
//! # async fn demo() -> workflow_engine::Result<()> {
//! let engine = WorkflowEngine::builder()
//!     .with_in_memory(Arc::new(InMemoryRepository::new()))
//!     .build()?;
//!
//! let ctx = RequestContext::new();
//! let started = engine
//!     .start_workflow(&ctx, StartWorkflowRequest::new("onboarding", r#"{"client_id": "c-1"}"#))
//!     .await?;
//! engine.advance_workflow(&ctx, &started.workflow.id).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::error::{Result, WorkflowError};
use crate::models::{Activity, Stage, StartWorkflowRequest, StartWorkflowResponse, Workflow};
use crate::orchestration::id_generator::{IdGenerator, UuidV7Generator};
use crate::orchestration::schema_processor::SchemaProcessor;
use crate::orchestration::stage_advancer::{AdvanceOutcome, StageAdvancer};
use crate::orchestration::template_cache::TemplateCache;
use crate::orchestration::workflow_initializer::WorkflowInitializer;
use crate::registry::ExecutorRegistry;
use crate::repository::{
    ActivityRepository, ActivityTemplateRepository, InMemoryRepository, StageRepository,
    StageTemplateRepository, TransactionService, WorkflowRepository, WorkflowTemplateRepository,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// The repository ports the engine reads and writes through
#[derive(Clone)]
pub struct Repositories {
    pub workflow_templates: Arc<dyn WorkflowTemplateRepository>,
    pub stage_templates: Arc<dyn StageTemplateRepository>,
    pub activity_templates: Arc<dyn ActivityTemplateRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub stages: Arc<dyn StageRepository>,
    pub activities: Arc<dyn ActivityRepository>,
}

impl Repositories {
    /// Every port backed by the same in-memory store
    pub fn in_memory(repo: Arc<InMemoryRepository>) -> Self {
        Self {
            workflow_templates: repo.clone(),
            stage_templates: repo.clone(),
            activity_templates: repo.clone(),
            workflows: repo.clone(),
            stages: repo.clone(),
            activities: repo,
        }
    }
}

pub struct WorkflowEngine {
    template_cache: Arc<TemplateCache>,
    registry: Arc<ExecutorRegistry>,
    initializer: WorkflowInitializer,
    advancer: StageAdvancer,
    repositories: Repositories,
    config: EngineConfig,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("registered_executors", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl WorkflowEngine {
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new()
    }

    /// Instantiate a workflow template with raw JSON input
    pub async fn start_workflow(
        &self,
        ctx: &RequestContext,
        request: StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse> {
        self.initializer.start_workflow(ctx, request).await
    }

    /// Execute the current Stage of an in-progress Workflow
    pub async fn advance_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: &str,
    ) -> Result<AdvanceOutcome> {
        self.advancer.advance(ctx, workflow_id).await
    }

    pub async fn cancel_workflow(&self, ctx: &RequestContext, workflow_id: &str) -> Result<Workflow> {
        self.advancer.cancel_workflow(ctx, workflow_id).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_workflow(&self, ctx: &RequestContext, workflow_id: &str) -> Result<Workflow> {
        Ok(ctx
            .run(
                "workflow.get",
                self.repositories.workflows.get(ctx, workflow_id),
            )
            .await?)
    }

    /// Materialized Stages of a Workflow in creation order
    pub async fn list_stages(&self, ctx: &RequestContext, workflow_id: &str) -> Result<Vec<Stage>> {
        Ok(ctx
            .run(
                "stage.list_by_workflow",
                self.repositories.stages.list_by_workflow(ctx, workflow_id),
            )
            .await?)
    }

    pub async fn list_activities(&self, ctx: &RequestContext, stage_id: &str) -> Result<Vec<Activity>> {
        Ok(ctx
            .run(
                "activity.list_by_stage",
                self.repositories.activities.list_by_stage(ctx, stage_id),
            )
            .await?)
    }

    pub fn template_cache(&self) -> &Arc<TemplateCache> {
        &self.template_cache
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Assembles a [`WorkflowEngine`]. Repositories are required; everything
/// else has a default.
#[derive(Default)]
pub struct WorkflowEngineBuilder {
    repositories: Option<Repositories>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    transactions: Option<Arc<dyn TransactionService>>,
    registry: Option<Arc<ExecutorRegistry>>,
    config: Option<EngineConfig>,
}

impl WorkflowEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repositories(mut self, repositories: Repositories) -> Self {
        self.repositories = Some(repositories);
        self
    }

    pub fn with_in_memory(self, repo: Arc<InMemoryRepository>) -> Self {
        self.with_repositories(Repositories::in_memory(repo))
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn with_transaction_service(mut self, transactions: Arc<dyn TransactionService>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// Executors must be registered before [`build`](Self::build); the
    /// registry is frozen once the engine exists.
    pub fn with_registry(mut self, registry: Arc<ExecutorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<WorkflowEngine> {
        let repositories = self.repositories.ok_or_else(|| {
            WorkflowError::Configuration("repositories must be provided".to_string())
        })?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UuidV7Generator));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ExecutorRegistry::new()));
        registry.freeze();

        let template_cache = Arc::new(TemplateCache::new(
            repositories.workflow_templates.clone(),
            repositories.stage_templates.clone(),
            repositories.activity_templates.clone(),
            &config.cache,
        ));

        let mut initializer = WorkflowInitializer::new(
            template_cache.clone(),
            SchemaProcessor::new().strict(config.schema.strict),
            id_generator.clone(),
            repositories.workflows.clone(),
            repositories.stages.clone(),
        )
        .with_config(config.workflow.clone());
        if let Some(transactions) = self.transactions {
            initializer = initializer.with_transactions(transactions);
        }

        let advancer = StageAdvancer::new(
            template_cache.clone(),
            registry.clone(),
            id_generator,
            repositories.workflows.clone(),
            repositories.stages.clone(),
            repositories.activities.clone(),
        )
        .with_dispatch_config(config.dispatch.clone());

        info!(
            registered_executors = registry.len(),
            failure_policy = ?config.dispatch.failure_policy,
            strict_schema = config.schema.strict,
            "Workflow engine ready"
        );

        Ok(WorkflowEngine {
            template_cache,
            registry,
            initializer,
            advancer,
            repositories,
            config,
        })
    }
}
