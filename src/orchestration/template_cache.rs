//! # Template Cache
//!
//! Read-through cache in front of the template repositories. Workflow
//! templates are keyed by id; stage templates by workflow template id and
//! activity templates by stage template id, both stored already sorted by
//! `(order_index, id)`.
//!
//! Template writes happen outside the engine, so whoever mutates a template
//! must call [`TemplateCache::apply_mutation`] (or one of the `invalidate_*`
//! methods) afterwards. Entries otherwise expire after the configured TTL.

use crate::cache::{CacheStats, ReadThroughCache};
use crate::config::CacheConfig;
use crate::context::RequestContext;
use crate::error::{Result, WorkflowError};
use crate::models::{sort_by_order, ActivityTemplate, StageTemplate, WorkflowTemplate};
use crate::repository::{
    ActivityTemplateRepository, StageTemplateRepository, WorkflowTemplateRepository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A template write the cache must forget about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateMutation {
    /// Template fields (name, schema, ...) changed or the template was deleted
    WorkflowTemplate { id: String },
    /// A stage template under this workflow template was added, removed or reordered
    StageTemplates { workflow_template_id: String },
    /// An activity template under this stage template was added, removed or changed
    ActivityTemplates { stage_template_id: String },
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateCacheStats {
    pub workflow_templates: CacheStats,
    pub stage_templates: CacheStats,
    pub activity_templates: CacheStats,
}

impl TemplateCacheStats {
    pub fn total_hits(&self) -> u64 {
        self.workflow_templates.hits + self.stage_templates.hits + self.activity_templates.hits
    }

    pub fn total_loads(&self) -> u64 {
        self.workflow_templates.loads + self.stage_templates.loads + self.activity_templates.loads
    }
}

pub struct TemplateCache {
    workflow_template_repo: Arc<dyn WorkflowTemplateRepository>,
    stage_template_repo: Arc<dyn StageTemplateRepository>,
    activity_template_repo: Arc<dyn ActivityTemplateRepository>,
    workflow_templates: ReadThroughCache<String, Arc<WorkflowTemplate>>,
    stage_templates: ReadThroughCache<String, Arc<Vec<StageTemplate>>>,
    activity_templates: ReadThroughCache<String, Arc<Vec<ActivityTemplate>>>,
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("workflow_templates", &self.workflow_templates)
            .field("stage_templates", &self.stage_templates)
            .field("activity_templates", &self.activity_templates)
            .finish()
    }
}

impl TemplateCache {
    pub fn new(
        workflow_template_repo: Arc<dyn WorkflowTemplateRepository>,
        stage_template_repo: Arc<dyn StageTemplateRepository>,
        activity_template_repo: Arc<dyn ActivityTemplateRepository>,
        config: &CacheConfig,
    ) -> Self {
        info!(
            ttl_seconds = config.ttl_seconds,
            max_entries = config.max_entries,
            single_flight = config.single_flight,
            "Initialized template cache"
        );

        Self {
            workflow_template_repo,
            stage_template_repo,
            activity_template_repo,
            workflow_templates: ReadThroughCache::new(
                "workflow_templates",
                config.ttl(),
                config.max_entries,
            )
            .with_single_flight(config.single_flight),
            stage_templates: ReadThroughCache::new(
                "stage_templates",
                config.ttl(),
                config.max_entries,
            )
            .with_single_flight(config.single_flight),
            activity_templates: ReadThroughCache::new(
                "activity_templates",
                config.ttl(),
                config.max_entries,
            )
            .with_single_flight(config.single_flight),
        }
    }

    /// Resolve a workflow template, reading through to the repository on a miss.
    ///
    /// An absent template is reported as `NotFound` and is not cached.
    pub async fn get_workflow_template(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<Arc<WorkflowTemplate>> {
        let key = id.to_string();
        self.workflow_templates
            .get_or_load(&key, || async {
                debug!(template_id = id, "Workflow template cache miss - fetching from repository");
                let template = ctx
                    .run("workflow_template.get", self.workflow_template_repo.get(ctx, id))
                    .await?;
                Ok::<_, WorkflowError>(Arc::new(template))
            })
            .await
    }

    /// Stage templates of a workflow template, ascending by `(order_index, id)`.
    /// An empty list is a valid result.
    pub async fn get_stage_templates(
        &self,
        ctx: &RequestContext,
        workflow_template_id: &str,
    ) -> Result<Arc<Vec<StageTemplate>>> {
        let key = workflow_template_id.to_string();
        self.stage_templates
            .get_or_load(&key, || async {
                debug!(
                    template_id = workflow_template_id,
                    "Stage template cache miss - fetching from repository"
                );
                let mut stages = ctx
                    .run(
                        "stage_template.list_by_workflow_template",
                        self.stage_template_repo
                            .list_by_workflow_template(ctx, workflow_template_id),
                    )
                    .await?;
                sort_by_order(&mut stages);
                Ok::<_, WorkflowError>(Arc::new(stages))
            })
            .await
    }

    /// Activity templates of a stage template, ascending by `(order_index, id)`
    pub async fn get_activity_templates(
        &self,
        ctx: &RequestContext,
        stage_template_id: &str,
    ) -> Result<Arc<Vec<ActivityTemplate>>> {
        let key = stage_template_id.to_string();
        self.activity_templates
            .get_or_load(&key, || async {
                debug!(
                    stage_template_id = stage_template_id,
                    "Activity template cache miss - fetching from repository"
                );
                let mut activities = ctx
                    .run(
                        "activity_template.list_by_stage_template",
                        self.activity_template_repo
                            .list_by_stage_template(ctx, stage_template_id),
                    )
                    .await?;
                sort_by_order(&mut activities);
                Ok::<_, WorkflowError>(Arc::new(activities))
            })
            .await
    }

    /// Forget a workflow template together with its stage list and the
    /// activity lists of any stages currently cached for it
    pub fn invalidate_workflow_template(&self, id: &str) {
        let key = id.to_string();
        if let Some(stages) = self.stage_templates.peek(&key) {
            for stage in stages.iter() {
                self.activity_templates.invalidate(&stage.id);
            }
        }
        self.workflow_templates.invalidate(&key);
        self.stage_templates.invalidate(&key);
        debug!(template_id = id, "Invalidated workflow template");
    }

    pub fn invalidate_stage_templates(&self, workflow_template_id: &str) {
        self.stage_templates
            .invalidate(&workflow_template_id.to_string());
        debug!(
            template_id = workflow_template_id,
            "Invalidated stage templates"
        );
    }

    pub fn invalidate_activity_templates(&self, stage_template_id: &str) {
        self.activity_templates
            .invalidate(&stage_template_id.to_string());
        debug!(
            stage_template_id = stage_template_id,
            "Invalidated activity templates"
        );
    }

    pub fn invalidate_all(&self) {
        self.workflow_templates.invalidate_all();
        self.stage_templates.invalidate_all();
        self.activity_templates.invalidate_all();
        info!("Template cache cleared");
    }

    /// Single hook for callers that write templates
    pub fn apply_mutation(&self, mutation: TemplateMutation) {
        match mutation {
            TemplateMutation::WorkflowTemplate { id } => self.invalidate_workflow_template(&id),
            TemplateMutation::StageTemplates {
                workflow_template_id,
            } => self.invalidate_stage_templates(&workflow_template_id),
            TemplateMutation::ActivityTemplates { stage_template_id } => {
                self.invalidate_activity_templates(&stage_template_id)
            }
            TemplateMutation::All => self.invalidate_all(),
        }
    }

    /// Drop expired entries from all three caches
    pub fn purge_expired(&self) -> usize {
        self.workflow_templates.purge_expired()
            + self.stage_templates.purge_expired()
            + self.activity_templates.purge_expired()
    }

    pub fn stats(&self) -> TemplateCacheStats {
        TemplateCacheStats {
            workflow_templates: self.workflow_templates.stats(),
            stage_templates: self.stage_templates.stats(),
            activity_templates: self.activity_templates.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn cache_over(repo: &Arc<InMemoryRepository>) -> TemplateCache {
        TemplateCache::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            &CacheConfig::default(),
        )
    }

    fn seeded() -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_workflow_template(WorkflowTemplate::new("T1", "Onboarding", "ws-1"));
        repo.upsert_stage_template(StageTemplate::new("S3", "T1", 3, "Close"));
        repo.upsert_stage_template(StageTemplate::new("S1", "T1", 1, "Open"));
        repo.upsert_stage_template(StageTemplate::new("S2", "T1", 2, "Work"));
        repo
    }

    #[tokio::test]
    async fn test_stage_templates_are_sorted() {
        let repo = seeded();
        let cache = cache_over(&repo);
        let ctx = RequestContext::new();

        let stages = cache.get_stage_templates(&ctx, "T1").await.unwrap();
        let ids: Vec<&str> = stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let repo = seeded();
        let cache = cache_over(&repo);
        let ctx = RequestContext::new();

        cache.get_workflow_template(&ctx, "T1").await.unwrap();
        cache.get_workflow_template(&ctx, "T1").await.unwrap();

        let stats = cache.stats().workflow_templates;
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_missing_template_is_not_found_and_not_cached() {
        let repo = seeded();
        let cache = cache_over(&repo);
        let ctx = RequestContext::new();

        let err = cache.get_workflow_template(&ctx, "nope").await.unwrap_err();
        assert!(err.is_not_found());

        repo.upsert_workflow_template(WorkflowTemplate::new("nope", "Late", "ws-1"));
        let template = cache.get_workflow_template(&ctx, "nope").await.unwrap();
        assert_eq!(template.name, "Late");
    }

    #[tokio::test]
    async fn test_no_stage_templates_is_empty_not_error() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.upsert_workflow_template(WorkflowTemplate::new("T0", "Empty", "ws-1"));
        let cache = cache_over(&repo);

        let stages = cache
            .get_stage_templates(&RequestContext::new(), "T0")
            .await
            .unwrap();
        assert!(stages.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_hook_invalidates_dependent_entries() {
        let repo = seeded();
        repo.upsert_activity_template(ActivityTemplate::new("A1", "S1", 0, "noop"));
        let cache = cache_over(&repo);
        let ctx = RequestContext::new();

        cache.get_workflow_template(&ctx, "T1").await.unwrap();
        cache.get_stage_templates(&ctx, "T1").await.unwrap();
        cache.get_activity_templates(&ctx, "S1").await.unwrap();

        repo.upsert_workflow_template(WorkflowTemplate::new("T1", "Renamed", "ws-1"));
        repo.upsert_activity_template(ActivityTemplate::new("A0", "S1", -1, "first"));
        cache.apply_mutation(TemplateMutation::WorkflowTemplate { id: "T1".into() });

        let template = cache.get_workflow_template(&ctx, "T1").await.unwrap();
        assert_eq!(template.name, "Renamed");
        let activities = cache.get_activity_templates(&ctx, "S1").await.unwrap();
        let ids: Vec<&str> = activities.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A0", "A1"]);
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_repository() {
        let repo = seeded();
        let cache = cache_over(&repo);
        let ctx = RequestContext::new();
        ctx.cancel();

        let err = cache.get_workflow_template(&ctx, "T1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled(_)));
        assert_eq!(cache.stats().workflow_templates.entries, 0);
    }
}
