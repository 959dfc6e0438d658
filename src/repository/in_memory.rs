//! In-process adapter implementing every repository port on `DashMap`s.
//!
//! Used by tests and embedded deployments. Records keep their insertion
//! sequence so list calls return them in creation order.

use super::{
    ActivityRepository, ActivityTemplateRepository, StageRepository, StageTemplateRepository,
    Transaction, TransactionService, WorkflowRepository, WorkflowTemplateRepository,
};
use crate::constants::entities;
use crate::context::RequestContext;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    Activity, ActivityTemplate, Stage, StageTemplate, Workflow, WorkflowTemplate,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Table<T> = DashMap<String, (u64, T)>;

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    sequence: AtomicU64,
    workflow_templates: Table<WorkflowTemplate>,
    stage_templates: Table<StageTemplate>,
    activity_templates: Table<ActivityTemplate>,
    workflows: Table<Workflow>,
    stages: Table<Stage>,
    activities: Table<Activity>,
    transactions: Arc<TransactionCounters>,
}

/// Commit/rollback counts observed by [`InMemoryRepository`] as a transaction service
#[derive(Debug, Default)]
pub struct TransactionCounters {
    pub begun: AtomicU64,
    pub committed: AtomicU64,
    pub rolled_back: AtomicU64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn upsert<T>(&self, table: &Table<T>, id: String, value: T) {
        let seq = table
            .get(&id)
            .map(|entry| entry.0)
            .unwrap_or_else(|| self.next_sequence());
        table.insert(id, (seq, value));
    }

    fn insert_new<T>(
        &self,
        table: &Table<T>,
        entity: &str,
        id: &str,
        value: T,
    ) -> RepositoryResult<()> {
        match table.entry(id.to_string()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict {
                entity: entity.to_string(),
                id: id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert((self.next_sequence(), value));
                Ok(())
            }
        }
    }

    fn replace_existing<T>(
        table: &Table<T>,
        entity: &str,
        id: &str,
        value: T,
    ) -> RepositoryResult<()> {
        match table.get_mut(id) {
            Some(mut entry) => {
                entry.1 = value;
                Ok(())
            }
            None => Err(RepositoryError::not_found(entity, id)),
        }
    }

    fn collect<T: Clone>(table: &Table<T>, filter: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<(u64, T)> = table
            .iter()
            .filter(|entry| filter(&entry.value().1))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, value)| value).collect()
    }

    // Template authoring helpers. Callers holding a TemplateCache must apply
    // the matching invalidation afterwards.

    pub fn upsert_workflow_template(&self, template: WorkflowTemplate) {
        self.upsert(&self.workflow_templates, template.id.clone(), template);
    }

    pub fn upsert_stage_template(&self, template: StageTemplate) {
        self.upsert(&self.stage_templates, template.id.clone(), template);
    }

    pub fn upsert_activity_template(&self, template: ActivityTemplate) {
        self.upsert(&self.activity_templates, template.id.clone(), template);
    }

    pub fn remove_workflow_template(&self, id: &str) -> Option<WorkflowTemplate> {
        self.workflow_templates.remove(id).map(|(_, (_, t))| t)
    }

    pub fn remove_stage_template(&self, id: &str) -> Option<StageTemplate> {
        self.stage_templates.remove(id).map(|(_, (_, t))| t)
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn transaction_counters(&self) -> Arc<TransactionCounters> {
        Arc::clone(&self.transactions)
    }
}

#[async_trait]
impl WorkflowTemplateRepository for InMemoryRepository {
    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<WorkflowTemplate> {
        ctx.ensure_active("workflow_template.get")?;
        self.workflow_templates
            .get(id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| RepositoryError::not_found(entities::WORKFLOW_TEMPLATE, id))
    }

    async fn list(&self, ctx: &RequestContext) -> RepositoryResult<Vec<WorkflowTemplate>> {
        ctx.ensure_active("workflow_template.list")?;
        Ok(Self::collect(&self.workflow_templates, |_| true))
    }
}

#[async_trait]
impl StageTemplateRepository for InMemoryRepository {
    async fn list_by_workflow_template(
        &self,
        ctx: &RequestContext,
        workflow_template_id: &str,
    ) -> RepositoryResult<Vec<StageTemplate>> {
        ctx.ensure_active("stage_template.list_by_workflow_template")?;
        Ok(Self::collect(&self.stage_templates, |t| {
            t.workflow_template_id == workflow_template_id
        }))
    }
}

#[async_trait]
impl ActivityTemplateRepository for InMemoryRepository {
    async fn list_by_stage_template(
        &self,
        ctx: &RequestContext,
        stage_template_id: &str,
    ) -> RepositoryResult<Vec<ActivityTemplate>> {
        ctx.ensure_active("activity_template.list_by_stage_template")?;
        Ok(Self::collect(&self.activity_templates, |t| {
            t.stage_template_id == stage_template_id
        }))
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryRepository {
    async fn create(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()> {
        ctx.ensure_active("workflow.create")?;
        self.insert_new(
            &self.workflows,
            entities::WORKFLOW,
            &workflow.id,
            workflow.clone(),
        )
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Workflow> {
        ctx.ensure_active("workflow.get")?;
        self.workflows
            .get(id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| RepositoryError::not_found(entities::WORKFLOW, id))
    }

    async fn update(&self, ctx: &RequestContext, workflow: &Workflow) -> RepositoryResult<()> {
        ctx.ensure_active("workflow.update")?;
        Self::replace_existing(
            &self.workflows,
            entities::WORKFLOW,
            &workflow.id,
            workflow.clone(),
        )
    }

    async fn list_by_template(
        &self,
        ctx: &RequestContext,
        template_id: &str,
    ) -> RepositoryResult<Vec<Workflow>> {
        ctx.ensure_active("workflow.list_by_template")?;
        Ok(Self::collect(&self.workflows, |w| w.template_id == template_id))
    }
}

#[async_trait]
impl StageRepository for InMemoryRepository {
    async fn create(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()> {
        ctx.ensure_active("stage.create")?;
        self.insert_new(&self.stages, entities::STAGE, &stage.id, stage.clone())
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> RepositoryResult<Stage> {
        ctx.ensure_active("stage.get")?;
        self.stages
            .get(id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| RepositoryError::not_found(entities::STAGE, id))
    }

    async fn update(&self, ctx: &RequestContext, stage: &Stage) -> RepositoryResult<()> {
        ctx.ensure_active("stage.update")?;
        Self::replace_existing(&self.stages, entities::STAGE, &stage.id, stage.clone())
    }

    async fn list_by_workflow(
        &self,
        ctx: &RequestContext,
        workflow_id: &str,
    ) -> RepositoryResult<Vec<Stage>> {
        ctx.ensure_active("stage.list_by_workflow")?;
        Ok(Self::collect(&self.stages, |s| s.workflow_id == workflow_id))
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn create(&self, ctx: &RequestContext, activity: &Activity) -> RepositoryResult<()> {
        ctx.ensure_active("activity.create")?;
        self.insert_new(
            &self.activities,
            entities::ACTIVITY,
            &activity.id,
            activity.clone(),
        )
    }

    async fn update(&self, ctx: &RequestContext, activity: &Activity) -> RepositoryResult<()> {
        ctx.ensure_active("activity.update")?;
        Self::replace_existing(
            &self.activities,
            entities::ACTIVITY,
            &activity.id,
            activity.clone(),
        )
    }

    async fn list_by_stage(
        &self,
        ctx: &RequestContext,
        stage_id: &str,
    ) -> RepositoryResult<Vec<Activity>> {
        ctx.ensure_active("activity.list_by_stage")?;
        Ok(Self::collect(&self.activities, |a| a.stage_id == stage_id))
    }
}

struct InMemoryTransaction {
    counters: Arc<TransactionCounters>,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.counters.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        self.counters.rolled_back.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl TransactionService for InMemoryRepository {
    async fn begin(&self, ctx: &RequestContext) -> RepositoryResult<Box<dyn Transaction>> {
        ctx.ensure_active("transaction.begin")?;
        self.transactions.begun.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(InMemoryTransaction {
            counters: Arc::clone(&self.transactions),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewWorkflow;
    use chrono::Utc;
    use serde_json::json;

    fn workflow(id: &str) -> Workflow {
        NewWorkflow {
            id: id.to_string(),
            template_id: "T1".to_string(),
            name: "run".to_string(),
            input: json!({}),
            workspace_id: "ws".to_string(),
            created_at: Utc::now(),
        }
        .into_workflow()
    }

    #[tokio::test]
    async fn test_absent_template_is_not_found() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        let err = WorkflowTemplateRepository::get(&repo, &ctx, "missing")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RepositoryError::not_found(entities::WORKFLOW_TEMPLATE, "missing")
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        WorkflowRepository::create(&repo, &ctx, &workflow("w1"))
            .await
            .unwrap();
        let err = WorkflowRepository::create(&repo, &ctx, &workflow("w1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { .. }));
        assert_eq!(repo.workflow_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_with_same_id_admit_one() {
        let repo = Arc::new(InMemoryRepository::new());

        let handles: Vec<_> = (0..16)
            .map(|attempt| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    let mut stage = Stage::pending("s-shared", "w1", "S1");
                    stage.stage_template_id = format!("S{attempt}");
                    StageRepository::create(&*repo, &RequestContext::new(), &stage)
                        .await
                        .map(|()| stage.stage_template_id)
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(template_id) => winners.push(template_id),
                Err(RepositoryError::Conflict { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, 15);
        let stored = StageRepository::get(&*repo, &RequestContext::new(), "s-shared")
            .await
            .unwrap();
        assert_eq!(stored.stage_template_id, winners[0]);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        let err = StageRepository::update(&repo, &ctx, &Stage::pending("s1", "w1", "S1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lists_preserve_insertion_order() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        for id in ["s-c", "s-a", "s-b"] {
            StageRepository::create(&repo, &ctx, &Stage::pending(id, "w1", "S1"))
                .await
                .unwrap();
        }
        StageRepository::create(&repo, &ctx, &Stage::pending("other", "w2", "S1"))
            .await
            .unwrap();

        let ids: Vec<String> = repo
            .list_by_workflow(&ctx, "w1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s-c", "s-a", "s-b"]);
    }

    #[tokio::test]
    async fn test_cancelled_context_rejects_calls() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        ctx.cancel();
        let err = WorkflowRepository::create(&repo, &ctx, &workflow("w1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Cancelled(_)));
        assert_eq!(repo.workflow_count(), 0);
    }

    #[tokio::test]
    async fn test_transaction_counters() {
        let repo = InMemoryRepository::new();
        let ctx = RequestContext::new();
        let tx = repo.begin(&ctx).await.unwrap();
        tx.commit().await.unwrap();
        let tx = repo.begin(&ctx).await.unwrap();
        tx.rollback().await.unwrap();

        let counters = repo.transaction_counters();
        assert_eq!(counters.begun.load(Ordering::Relaxed), 2);
        assert_eq!(counters.committed.load(Ordering::Relaxed), 1);
        assert_eq!(counters.rolled_back.load(Ordering::Relaxed), 1);
    }
}
