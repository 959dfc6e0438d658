//! # Workflow Initializer
//!
//! Creates a running [`Workflow`] from a template.
//!
//! ## Overview
//!
//! Creation is a two-step protocol with no saga across the pair:
//!
//! 1. The Workflow record is written (inside a transaction when a
//!    [`TransactionService`] is configured). Failure here fails the call and
//!    no Stage is attempted.
//! 2. The first Stage is materialized as `pending`. Failure here is logged
//!    and reported as a warning on an otherwise successful response; the
//!    stage advancer re-materializes the missing Stage later.
//!
//! Input is validated and enriched by the [`SchemaProcessor`] before anything
//! is written, so a rejected input never leaves a Workflow behind.

use crate::config::WorkflowConfig;
use crate::constants::{entities, events};
use crate::context::RequestContext;
use crate::error::{RepositoryError, Result, WorkflowError};
use crate::logging::log_workflow_operation;
use crate::models::{
    NewWorkflow, Stage, StageTemplate, StartWorkflowRequest, StartWorkflowResponse,
    StartWorkflowWarning, Workflow, WorkflowTemplate,
};
use crate::orchestration::id_generator::IdGenerator;
use crate::orchestration::schema_processor::SchemaProcessor;
use crate::orchestration::template_cache::TemplateCache;
use crate::repository::{StageRepository, TransactionService, WorkflowRepository};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct WorkflowInitializer {
    template_cache: Arc<TemplateCache>,
    schema_processor: SchemaProcessor,
    id_generator: Arc<dyn IdGenerator>,
    workflow_repo: Arc<dyn WorkflowRepository>,
    stage_repo: Arc<dyn StageRepository>,
    transactions: Option<Arc<dyn TransactionService>>,
    config: WorkflowConfig,
}

impl WorkflowInitializer {
    pub fn new(
        template_cache: Arc<TemplateCache>,
        schema_processor: SchemaProcessor,
        id_generator: Arc<dyn IdGenerator>,
        workflow_repo: Arc<dyn WorkflowRepository>,
        stage_repo: Arc<dyn StageRepository>,
    ) -> Self {
        Self {
            template_cache,
            schema_processor,
            id_generator,
            workflow_repo,
            stage_repo,
            transactions: None,
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_transactions(mut self, transactions: Arc<dyn TransactionService>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Instantiate a workflow template.
    ///
    /// Returns `success = true` once the Workflow is persisted, even when the
    /// initial Stage could not be; check [`StartWorkflowResponse::is_degraded`].
    #[instrument(skip(self, ctx, request), fields(template_id = %request.template_id))]
    pub async fn start_workflow(
        &self,
        ctx: &RequestContext,
        request: StartWorkflowRequest,
    ) -> Result<StartWorkflowResponse> {
        let template_id = request.template_id.trim();
        if template_id.is_empty() {
            return Err(WorkflowError::Validation(
                "template_id must not be empty".to_string(),
            ));
        }

        info!(template_id = %template_id, "Starting workflow initialization");

        let template = self
            .template_cache
            .get_workflow_template(ctx, template_id)
            .await?;

        // Templates outside the caller's workspace are invisible to it
        if let Some(workspace_id) = ctx.workspace_id() {
            if workspace_id != template.workspace_id {
                return Err(WorkflowError::not_found(
                    entities::WORKFLOW_TEMPLATE,
                    template_id,
                ));
            }
        }

        let input = self
            .schema_processor
            .process(&request.input_json, template.input_schema.as_ref())?;

        let created_at = Utc::now();
        let new_workflow = NewWorkflow {
            id: self.id_generator.generate_id(),
            template_id: template.id.clone(),
            name: request
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| self.default_display_name(&template, created_at)),
            input,
            workspace_id: template.workspace_id.clone(),
            created_at,
        };
        let workflow = new_workflow.into_workflow();

        self.persist_workflow(ctx, &workflow).await?;
        debug!(workflow_id = %workflow.id, "Created workflow record");

        let mut warnings = Vec::new();
        let initial_stage = match self
            .template_cache
            .get_stage_templates(ctx, &template.id)
            .await
        {
            Ok(stage_templates) => match stage_templates.first() {
                Some(first) => self
                    .materialize_initial_stage(ctx, &workflow, first, &mut warnings)
                    .await,
                None => {
                    debug!(
                        workflow_id = %workflow.id,
                        "Template defines no stages; workflow created without a stage"
                    );
                    None
                }
            },
            Err(e) => {
                warn!(
                    workflow_id = %workflow.id,
                    template_id = %template.id,
                    error = %e,
                    interrupted = e.is_interrupted(),
                    "Could not resolve stage templates; workflow created without a stage"
                );
                warnings.push(if e.is_interrupted() {
                    StartWorkflowWarning::InitialStageInterrupted {
                        stage_template_id: None,
                        reason: e.to_string(),
                    }
                } else {
                    StartWorkflowWarning::StageTemplatesUnavailable {
                        reason: e.to_string(),
                    }
                });
                None
            }
        };

        if warnings.is_empty() {
            log_workflow_operation(
                events::WORKFLOW_STARTED,
                Some(&workflow.id),
                Some(&workflow.template_id),
                "success",
                None,
            );
        } else {
            let details = warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            log_workflow_operation(
                events::WORKFLOW_DEGRADED,
                Some(&workflow.id),
                Some(&workflow.template_id),
                "degraded",
                Some(&details),
            );
        }

        info!(
            workflow_id = %workflow.id,
            template_id = %workflow.template_id,
            initial_stage_id = initial_stage.as_ref().map(|s| s.id.as_str()),
            warning_count = warnings.len(),
            "Workflow initialization completed"
        );

        Ok(StartWorkflowResponse {
            workflow,
            initial_stage,
            success: true,
            warnings,
        })
    }

    async fn persist_workflow(&self, ctx: &RequestContext, workflow: &Workflow) -> Result<()> {
        let Some(transactions) = &self.transactions else {
            return ctx
                .run("workflow.create", self.workflow_repo.create(ctx, workflow))
                .await
                .map_err(WorkflowError::from);
        };

        let tx = ctx
            .run("transaction.begin", transactions.begin(ctx))
            .await?;

        match ctx
            .run("workflow.create", self.workflow_repo.create(ctx, workflow))
            .await
        {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    error!(
                        workflow_id = %workflow.id,
                        error = %rollback_error,
                        "Failed to roll back workflow creation"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn materialize_initial_stage(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
        stage_template: &StageTemplate,
        warnings: &mut Vec<StartWorkflowWarning>,
    ) -> Option<Stage> {
        let stage = Stage::pending(
            self.id_generator.generate_id(),
            workflow.id.clone(),
            stage_template.id.clone(),
        );

        match ctx
            .run("stage.create", self.stage_repo.create(ctx, &stage))
            .await
        {
            Ok(()) => {
                debug!(
                    workflow_id = %workflow.id,
                    stage_id = %stage.id,
                    stage_template_id = %stage_template.id,
                    "Materialized initial stage"
                );
                Some(stage)
            }
            Err(e) => {
                let reason = e.to_string();
                let warning = match e {
                    RepositoryError::Cancelled(_) | RepositoryError::DeadlineExceeded(_) => {
                        warn!(
                            workflow_id = %workflow.id,
                            stage_template_id = %stage_template.id,
                            error = %reason,
                            "Caller gave up before the initial stage was created"
                        );
                        StartWorkflowWarning::InitialStageInterrupted {
                            stage_template_id: Some(stage_template.id.clone()),
                            reason,
                        }
                    }
                    _ => {
                        warn!(
                            workflow_id = %workflow.id,
                            stage_template_id = %stage_template.id,
                            error = %reason,
                            "Failed to create initial stage; workflow continues without it"
                        );
                        StartWorkflowWarning::InitialStageNotCreated {
                            stage_template_id: stage_template.id.clone(),
                            reason,
                        }
                    }
                };
                warnings.push(warning);
                None
            }
        }
    }

    /// `"<template name> — <creation timestamp>"`
    fn default_display_name(&self, template: &WorkflowTemplate, created_at: DateTime<Utc>) -> String {
        let mut timestamp = String::new();
        if write!(
            timestamp,
            "{}",
            created_at.format(&self.config.display_name_timestamp_format)
        )
        .is_err()
        {
            timestamp = created_at.to_rfc3339();
        }
        format!("{} — {}", template.name, timestamp)
    }
}
