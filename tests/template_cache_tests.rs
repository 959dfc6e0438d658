//! Template cache behavior observed through the engine.

mod common;

use common::*;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use workflow_engine::models::{StageTemplate, WorkflowTemplate};
use workflow_engine::orchestration::Repositories;
use workflow_engine::repository::InMemoryRepository;
use workflow_engine::{RequestContext, StartWorkflowRequest, TemplateMutation, WorkflowEngine};

fn counting_engine(
    repo: &Arc<InMemoryRepository>,
    delay: Option<Duration>,
) -> (Arc<CountingTemplateRepository>, WorkflowEngine) {
    let mut counting = CountingTemplateRepository::new(repo.clone());
    if let Some(delay) = delay {
        counting = counting.with_delay(delay);
    }
    let counting = Arc::new(counting);

    let mut repositories = Repositories::in_memory(repo.clone());
    repositories.workflow_templates = counting.clone();
    repositories.stage_templates = counting.clone();
    repositories.activity_templates = counting.clone();

    let engine = WorkflowEngine::builder()
        .with_repositories(repositories)
        .build()
        .unwrap();
    (counting, engine)
}

fn request() -> StartWorkflowRequest {
    StartWorkflowRequest::new("T1", r#"{"client_id":"c-1"}"#)
}

#[tokio::test]
async fn test_second_start_is_served_from_cache() {
    let repo = Arc::new(InMemoryRepository::new());
    seed_single_stage(&repo);
    let (counting, engine) = counting_engine(&repo, None);
    let ctx = RequestContext::new();

    engine.start_workflow(&ctx, request()).await.unwrap();
    engine.start_workflow(&ctx, request()).await.unwrap();

    assert_eq!(counting.template_reads(), 1);
    assert_eq!(counting.stage_list_reads(), 1);
    assert_eq!(repo.workflow_count(), 2);

    let stats = engine.template_cache().stats();
    assert_eq!(stats.workflow_templates.hits, 1);
    assert_eq!(stats.workflow_templates.loads, 1);
    assert_eq!(stats.stage_templates.hits, 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_read() {
    let repo = Arc::new(InMemoryRepository::new());
    seed_single_stage(&repo);
    let (counting, engine) = counting_engine(&repo, Some(Duration::from_millis(25)));
    let ctx = RequestContext::new();

    let results = join_all((0..8).map(|_| engine.start_workflow(&ctx, request()))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(counting.template_reads(), 1);
    assert_eq!(counting.stage_list_reads(), 1);
    assert_eq!(repo.workflow_count(), 8);
    assert_eq!(repo.stage_count(), 8);
}

#[tokio::test]
async fn test_not_found_is_not_cached() {
    let repo = Arc::new(InMemoryRepository::new());
    let (counting, engine) = counting_engine(&repo, None);
    let ctx = RequestContext::new();

    assert!(engine.start_workflow(&ctx, request()).await.is_err());
    seed_single_stage(&repo);
    engine.start_workflow(&ctx, request()).await.unwrap();

    assert_eq!(counting.template_reads(), 2);
}

#[tokio::test]
async fn test_mutation_hook_refreshes_template_and_stages() {
    let repo = Arc::new(InMemoryRepository::new());
    seed_single_stage(&repo);
    let (counting, engine) = counting_engine(&repo, None);
    let ctx = RequestContext::new();

    engine.start_workflow(&ctx, request()).await.unwrap();

    repo.upsert_workflow_template(WorkflowTemplate::new("T1", "Renamed Intake", "ws-1"));
    repo.upsert_stage_template(StageTemplate::new("S0", "T1", 0, "Screening"));

    // Stale until the hook runs
    let stale = engine.start_workflow(&ctx, request()).await.unwrap();
    assert!(stale.workflow.name.starts_with("Client Intake"));
    assert_eq!(stale.initial_stage.unwrap().stage_template_id, "S1");

    engine
        .template_cache()
        .apply_mutation(TemplateMutation::WorkflowTemplate { id: "T1".into() });

    let fresh = engine
        .start_workflow(&ctx, StartWorkflowRequest::new("T1", "{}"))
        .await
        .unwrap();
    assert!(fresh.workflow.name.starts_with("Renamed Intake"));
    assert_eq!(fresh.initial_stage.unwrap().stage_template_id, "S0");
    assert_eq!(counting.template_reads(), 2);
    assert_eq!(counting.stage_list_reads(), 2);
}

#[tokio::test]
async fn test_invalidate_all_forces_reload() {
    let repo = Arc::new(InMemoryRepository::new());
    seed_single_stage(&repo);
    let (counting, engine) = counting_engine(&repo, None);
    let ctx = RequestContext::new();

    engine.start_workflow(&ctx, request()).await.unwrap();
    engine.template_cache().apply_mutation(TemplateMutation::All);
    engine.start_workflow(&ctx, request()).await.unwrap();

    assert_eq!(counting.template_reads(), 2);
    assert_eq!(engine.template_cache().stats().total_loads(), 4);
}
