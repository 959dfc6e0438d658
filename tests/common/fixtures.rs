//! Template fixtures and engine assembly shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use workflow_engine::config::EngineConfig;
use workflow_engine::models::{ActivityTemplate, StageTemplate, WorkflowTemplate};
use workflow_engine::registry::{ExecutorRegistry, FnExecutor};
use workflow_engine::repository::InMemoryRepository;
use workflow_engine::WorkflowEngine;

/// `{required: ["client_id"], client_id: string, priority: string = "normal"}`
pub fn client_schema() -> Value {
    json!({
        "type": "object",
        "required": ["client_id"],
        "properties": {
            "client_id": {"type": "string"},
            "priority": {"type": "string", "default": "normal"}
        }
    })
}

/// Template `T1` with the client schema and a single stage template `S1`
pub fn seed_single_stage(repo: &InMemoryRepository) {
    repo.upsert_workflow_template(
        WorkflowTemplate::new("T1", "Client Intake", "ws-1").with_input_schema(client_schema()),
    );
    repo.upsert_stage_template(StageTemplate::new("S1", "T1", 1, "Intake"));
}

/// Template `billing` with two stages:
///
/// - `prepare`: `account.open` (binds `input.client_id`) then `invoice.draft`
///   (binds the account id produced by the first activity)
/// - `deliver`: `invoice.send`
pub fn seed_billing(repo: &InMemoryRepository) {
    repo.upsert_workflow_template(
        WorkflowTemplate::new("billing", "Billing", "ws-billing")
            .with_input_schema(client_schema()),
    );
    repo.upsert_stage_template(StageTemplate::new("deliver", "billing", 20, "Deliver"));
    repo.upsert_stage_template(StageTemplate::new("prepare", "billing", 10, "Prepare"));

    repo.upsert_activity_template(
        ActivityTemplate::new("open-account", "prepare", 1, "account.open")
            .with_binding("client", "input.client_id"),
    );
    repo.upsert_activity_template(
        ActivityTemplate::new("draft-invoice", "prepare", 2, "invoice.draft")
            .with_binding("account", "activities['open-account'].account_id")
            .with_binding("priority", "input.priority"),
    );
    repo.upsert_activity_template(
        ActivityTemplate::new("send-invoice", "deliver", 1, "invoice.send")
            .with_binding("invoice", "activities.draft-invoice.invoice_id"),
    );
}

/// Executors for the billing template; `calls` counts every invocation
pub fn billing_registry(calls: Arc<AtomicUsize>) -> Arc<ExecutorRegistry> {
    let registry = Arc::new(ExecutorRegistry::new());

    let counter = calls.clone();
    registry
        .register(
            "account.open",
            Arc::new(FnExecutor::new("account", move |_ctx, req| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!({"account_id": format!("acct-{}", req["client"].as_str().unwrap_or("?"))})) }
            })),
        )
        .unwrap();

    let counter = calls.clone();
    registry
        .register(
            "invoice.draft",
            Arc::new(FnExecutor::new("invoice-draft", move |_ctx, req| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(json!({
                        "invoice_id": "inv-1",
                        "account": req["account"],
                        "priority": req["priority"]
                    }))
                }
            })),
        )
        .unwrap();

    let counter = calls;
    registry
        .register(
            "invoice.send",
            Arc::new(FnExecutor::new("invoice-send", move |_ctx, req| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!({"sent": req["invoice"]})) }
            })),
        )
        .unwrap();

    registry
}

pub fn engine(repo: Arc<InMemoryRepository>, registry: Arc<ExecutorRegistry>) -> WorkflowEngine {
    engine_with_config(repo, registry, EngineConfig::default())
}

pub fn engine_with_config(
    repo: Arc<InMemoryRepository>,
    registry: Arc<ExecutorRegistry>,
    config: EngineConfig,
) -> WorkflowEngine {
    WorkflowEngine::builder()
        .with_in_memory(repo)
        .with_registry(registry)
        .with_config(config)
        .build()
        .expect("engine should build")
}
