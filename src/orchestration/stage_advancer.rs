//! # Stage Advancer
//!
//! Moves an in-progress Workflow through its current Stage.
//!
//! One call to [`StageAdvancer::advance`] executes every Activity of the
//! current Stage in template order, folds successful results into the
//! workflow context under `activities.<activity_template_id>`, and then
//! either materializes the next Stage, completes the Workflow, or fails it.
//! Advancement is driven by callers; nothing here runs on a timer.
//!
//! A Workflow whose initial Stage was never written is repaired here: the
//! missing Stage is materialized before execution begins.

use crate::config::{DispatchConfig, FailurePolicy};
use crate::constants::{entities, events};
use crate::context::RequestContext;
use crate::error::{Result, WorkflowError};
use crate::logging::{log_stage_operation, log_workflow_operation};
use crate::models::{Activity, ActivityTemplate, Stage, StageTemplate, Workflow};
use crate::orchestration::id_generator::IdGenerator;
use crate::orchestration::parameter_binding::bind_parameters;
use crate::orchestration::template_cache::TemplateCache;
use crate::registry::{DispatchError, ExecutionContext, ExecutorRegistry};
use crate::repository::{ActivityRepository, StageRepository, WorkflowRepository};
use crate::state_machine::{
    ActivityEvent, ActivityState, ActivityStateMachine, StageEvent, StageState,
    StageStateMachine, StateMachineError, WorkflowEvent, WorkflowState, WorkflowStateMachine,
};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// What one advancement call did
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    /// The Workflow as persisted at the end of the call
    pub workflow: Workflow,
    /// The Stage that was executed, if the template has any stages
    pub stage: Option<Stage>,
    /// The pending Stage materialized for the next template, if any
    pub next_stage: Option<Stage>,
    /// Activities created during this call, in execution order
    pub activities: Vec<Activity>,
    pub dispatch_errors: Vec<DispatchError>,
}

impl AdvanceOutcome {
    pub fn is_completed(&self) -> bool {
        self.workflow.status == WorkflowState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.workflow.status == WorkflowState::Failed
    }
}

pub struct StageAdvancer {
    template_cache: Arc<TemplateCache>,
    registry: Arc<ExecutorRegistry>,
    id_generator: Arc<dyn IdGenerator>,
    workflow_repo: Arc<dyn WorkflowRepository>,
    stage_repo: Arc<dyn StageRepository>,
    activity_repo: Arc<dyn ActivityRepository>,
    dispatch: DispatchConfig,
}

impl StageAdvancer {
    pub fn new(
        template_cache: Arc<TemplateCache>,
        registry: Arc<ExecutorRegistry>,
        id_generator: Arc<dyn IdGenerator>,
        workflow_repo: Arc<dyn WorkflowRepository>,
        stage_repo: Arc<dyn StageRepository>,
        activity_repo: Arc<dyn ActivityRepository>,
    ) -> Self {
        Self {
            template_cache,
            registry,
            id_generator,
            workflow_repo,
            stage_repo,
            activity_repo,
            dispatch: DispatchConfig::default(),
        }
    }

    pub fn with_dispatch_config(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Execute the current Stage of `workflow_id`.
    ///
    /// Activity failures are not errors of this call: they are recorded on
    /// the Activity, fail the Stage and Workflow, and are returned in
    /// [`AdvanceOutcome::dispatch_errors`]. Errors are reserved for lookups,
    /// persistence, cancellation and illegal state.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn advance(&self, ctx: &RequestContext, workflow_id: &str) -> Result<AdvanceOutcome> {
        let mut workflow = self.load_active_workflow(ctx, workflow_id).await?;

        let stage_templates = self
            .template_cache
            .get_stage_templates(ctx, &workflow.template_id)
            .await?;

        let index = workflow.current_stage_index as usize;
        let Some(stage_template) = stage_templates.get(index) else {
            if !stage_templates.is_empty() {
                warn!(
                    workflow_id = %workflow.id,
                    current_stage_index = index,
                    stage_template_count = stage_templates.len(),
                    "Stage index is past the last stage template; completing workflow"
                );
            }
            self.finish_workflow(&mut workflow, WorkflowEvent::Complete)?;
            self.save_workflow(ctx, &workflow).await?;
            return Ok(AdvanceOutcome {
                workflow,
                stage: None,
                next_stage: None,
                activities: Vec::new(),
                dispatch_errors: Vec::new(),
            });
        };

        let (mut stage, reusable) = self
            .locate_current_stage(ctx, &workflow, stage_template)
            .await?;

        if stage.status == StageState::Pending {
            StageStateMachine::transition(&mut stage, StageEvent::Start)?;
            self.save_stage(ctx, &stage).await?;
            log_stage_operation(
                events::STAGE_STARTED,
                &workflow.id,
                Some(&stage.id),
                Some(&stage_template.id),
                "in_progress",
                None,
            );
        }

        let activity_templates = self
            .template_cache
            .get_activity_templates(ctx, &stage_template.id)
            .await?;

        let mut activities = Vec::with_capacity(activity_templates.len());
        let mut dispatch_errors = Vec::new();

        for activity_template in activity_templates.iter() {
            ctx.ensure_active("stage.advance")?;

            if let Some(previous) = reusable
                .iter()
                .find(|a| a.activity_template_id == activity_template.id)
            {
                debug!(
                    activity_id = %previous.id,
                    activity_template_id = %activity_template.id,
                    "Reusing result of previously completed activity"
                );
                if let Some(result) = &previous.result {
                    workflow.record_activity_result(&activity_template.id, result.clone());
                }
                continue;
            }

            let (activity, outcome) = self
                .run_activity(ctx, &workflow, &stage, activity_template)
                .await?;

            match outcome {
                Ok(result) => workflow.record_activity_result(&activity_template.id, result),
                Err(dispatch_error) => {
                    dispatch_errors.push(dispatch_error);
                    if self.dispatch.failure_policy == FailurePolicy::FailFast {
                        activities.push(activity);
                        break;
                    }
                }
            }
            activities.push(activity);
        }

        let mut next_stage = None;
        if let Some(first_error) = dispatch_errors.first() {
            let reason = format!(
                "{} of {} activities failed; first: {first_error}",
                dispatch_errors.len(),
                activity_templates.len()
            );
            StageStateMachine::transition(&mut stage, StageEvent::Fail(reason.clone()))?;
            self.save_stage(ctx, &stage).await?;
            log_stage_operation(
                events::STAGE_FAILED,
                &workflow.id,
                Some(&stage.id),
                Some(&stage_template.id),
                "failed",
                Some(&reason),
            );
            self.finish_workflow(&mut workflow, WorkflowEvent::Fail(reason))?;
        } else {
            StageStateMachine::transition(&mut stage, StageEvent::Complete)?;
            self.save_stage(ctx, &stage).await?;
            log_stage_operation(
                events::STAGE_COMPLETED,
                &workflow.id,
                Some(&stage.id),
                Some(&stage_template.id),
                "completed",
                None,
            );

            match stage_templates.get(index + 1) {
                Some(next_template) => {
                    workflow.current_stage_index += 1;
                    workflow.touch();
                    next_stage = self
                        .materialize_stage(ctx, &workflow, next_template)
                        .await;
                }
                None => self.finish_workflow(&mut workflow, WorkflowEvent::Complete)?,
            }
        }

        self.save_workflow(ctx, &workflow).await?;

        info!(
            workflow_id = %workflow.id,
            stage_id = %stage.id,
            workflow_status = %workflow.status,
            activity_count = activities.len(),
            failed_activities = dispatch_errors.len(),
            "Stage advancement finished"
        );

        Ok(AdvanceOutcome {
            workflow,
            stage: Some(stage),
            next_stage,
            activities,
            dispatch_errors,
        })
    }

    /// Cancel an in-progress Workflow. Terminal Workflows are rejected.
    #[instrument(skip(self, ctx))]
    pub async fn cancel_workflow(&self, ctx: &RequestContext, workflow_id: &str) -> Result<Workflow> {
        let mut workflow = self.load_active_workflow(ctx, workflow_id).await?;
        self.finish_workflow(&mut workflow, WorkflowEvent::Cancel)?;
        self.save_workflow(ctx, &workflow).await?;
        Ok(workflow)
    }

    async fn load_active_workflow(&self, ctx: &RequestContext, workflow_id: &str) -> Result<Workflow> {
        if workflow_id.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "workflow_id must not be empty".to_string(),
            ));
        }

        let workflow = ctx
            .run("workflow.get", self.workflow_repo.get(ctx, workflow_id))
            .await?;

        if workflow.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                entity: "workflow",
                id: workflow.id.clone(),
                state: workflow.status.to_string(),
            }
            .into());
        }
        Ok(workflow)
    }

    /// Find the live Stage for `stage_template`, or materialize it when the
    /// initial write was lost. An in-progress Stage left by an interrupted
    /// call is resumed, and its completed Activities are returned for reuse.
    async fn locate_current_stage(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
        stage_template: &StageTemplate,
    ) -> Result<(Stage, Vec<Activity>)> {
        let stages = ctx
            .run(
                "stage.list_by_workflow",
                self.stage_repo.list_by_workflow(ctx, &workflow.id),
            )
            .await?;

        let existing = stages
            .into_iter()
            .rev()
            .find(|s| s.stage_template_id == stage_template.id && !s.status.is_terminal());

        match existing {
            Some(stage) if stage.status == StageState::InProgress => {
                let completed = ctx
                    .run(
                        "activity.list_by_stage",
                        self.activity_repo.list_by_stage(ctx, &stage.id),
                    )
                    .await?
                    .into_iter()
                    .filter(|a| a.status == ActivityState::Completed)
                    .collect();
                warn!(
                    workflow_id = %workflow.id,
                    stage_id = %stage.id,
                    "Resuming stage left in progress by an earlier call"
                );
                Ok((stage, completed))
            }
            Some(stage) => Ok((stage, Vec::new())),
            None => {
                warn!(
                    workflow_id = %workflow.id,
                    stage_template_id = %stage_template.id,
                    "Current stage is missing; re-materializing it"
                );
                let stage = Stage::pending(
                    self.id_generator.generate_id(),
                    workflow.id.clone(),
                    stage_template.id.clone(),
                );
                ctx.run("stage.create", self.stage_repo.create(ctx, &stage))
                    .await?;
                log_stage_operation(
                    events::STAGE_MATERIALIZED,
                    &workflow.id,
                    Some(&stage.id),
                    Some(&stage_template.id),
                    "pending",
                    Some("repaired"),
                );
                Ok((stage, Vec::new()))
            }
        }
    }

    /// Create, dispatch and settle one Activity.
    ///
    /// The inner result is the executor's response or the reason the
    /// Activity failed; the outer error aborts the whole advancement.
    async fn run_activity(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
        stage: &Stage,
        template: &ActivityTemplate,
    ) -> Result<(Activity, std::result::Result<Value, DispatchError>)> {
        let mut activity = Activity::pending(
            self.id_generator.generate_id(),
            stage.id.clone(),
            template.id.clone(),
        );
        ctx.run("activity.create", self.activity_repo.create(ctx, &activity))
            .await?;

        let prepared = self
            .registry
            .resolve(&template.use_case_code)
            .and_then(|executor| {
                bind_parameters(&template.parameter_bindings, &workflow.context)
                    .map(|request| (executor, request))
            });

        let outcome = match prepared {
            Ok((executor, request)) => {
                ActivityStateMachine::transition(&mut activity, ActivityEvent::Start)?;
                self.save_activity(ctx, &activity).await?;

                let exec_ctx = ExecutionContext {
                    request: ctx.child(),
                    workflow_id: workflow.id.clone(),
                    stage_id: stage.id.clone(),
                    activity_id: activity.id.clone(),
                    activity_template_id: template.id.clone(),
                    use_case_code: template.use_case_code.clone(),
                    workspace_id: workflow.workspace_id.clone(),
                };
                let timeout = self.dispatch.activity_timeout();
                let started = Instant::now();

                let execution = ctx
                    .run("activity.execute", async {
                        Ok(tokio::time::timeout(
                            timeout,
                            AssertUnwindSafe(executor.execute(&exec_ctx, request)).catch_unwind(),
                        )
                        .await)
                    })
                    .await?;

                let outcome = match execution {
                    Ok(Ok(result)) => result,
                    Ok(Err(_panic)) => {
                        error!(
                            activity_id = %activity.id,
                            use_case_code = %template.use_case_code,
                            executor = executor.name(),
                            "Executor panicked"
                        );
                        Err(DispatchError::Panicked {
                            code: template.use_case_code.clone(),
                        })
                    }
                    Err(_elapsed) => Err(DispatchError::Timeout {
                        code: template.use_case_code.clone(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }),
                };

                debug!(
                    activity_id = %activity.id,
                    executor = executor.name(),
                    execution_time_ms = started.elapsed().as_millis() as u64,
                    success = outcome.is_ok(),
                    "Executor returned"
                );
                outcome
            }
            Err(dispatch_error) => Err(dispatch_error),
        };

        match &outcome {
            Ok(result) => {
                ActivityStateMachine::transition(&mut activity, ActivityEvent::Complete(result.clone()))?;
                log_stage_operation(
                    events::ACTIVITY_COMPLETED,
                    &workflow.id,
                    Some(&stage.id),
                    Some(&template.id),
                    "completed",
                    None,
                );
            }
            Err(dispatch_error) => {
                ActivityStateMachine::transition(
                    &mut activity,
                    ActivityEvent::fail_with_error(dispatch_error.to_string()),
                )?;
                warn!(
                    workflow_id = %workflow.id,
                    activity_id = %activity.id,
                    activity_template_id = %template.id,
                    error_kind = dispatch_error.kind(),
                    error = %dispatch_error,
                    "Activity failed"
                );
                log_stage_operation(
                    events::ACTIVITY_FAILED,
                    &workflow.id,
                    Some(&stage.id),
                    Some(&template.id),
                    "failed",
                    Some(&dispatch_error.to_string()),
                );
            }
        }
        self.save_activity(ctx, &activity).await?;

        Ok((activity, outcome))
    }

    async fn materialize_stage(
        &self,
        ctx: &RequestContext,
        workflow: &Workflow,
        stage_template: &StageTemplate,
    ) -> Option<Stage> {
        let stage = Stage::pending(
            self.id_generator.generate_id(),
            workflow.id.clone(),
            stage_template.id.clone(),
        );
        match ctx.run("stage.create", self.stage_repo.create(ctx, &stage)).await {
            Ok(()) => {
                log_stage_operation(
                    events::STAGE_MATERIALIZED,
                    &workflow.id,
                    Some(&stage.id),
                    Some(&stage_template.id),
                    "pending",
                    None,
                );
                Some(stage)
            }
            Err(e) => {
                // repaired on the next advance
                warn!(
                    workflow_id = %workflow.id,
                    stage_template_id = %stage_template.id,
                    error = %e,
                    "Failed to materialize next stage"
                );
                None
            }
        }
    }

    fn finish_workflow(&self, workflow: &mut Workflow, event: WorkflowEvent) -> Result<()> {
        let (operation, status) = match &event {
            WorkflowEvent::Complete => (events::WORKFLOW_COMPLETED, "completed"),
            WorkflowEvent::Fail(_) => (events::WORKFLOW_FAILED, "failed"),
            WorkflowEvent::Cancel => (events::WORKFLOW_CANCELLED, "cancelled"),
        };
        let details = event.error_message().map(str::to_string);
        WorkflowStateMachine::transition(workflow, event)?;
        log_workflow_operation(
            operation,
            Some(&workflow.id),
            Some(&workflow.template_id),
            status,
            details.as_deref(),
        );
        Ok(())
    }

    async fn save_workflow(&self, ctx: &RequestContext, workflow: &Workflow) -> Result<()> {
        ctx.run("workflow.update", self.workflow_repo.update(ctx, workflow))
            .await
            .map_err(|e| persistence_context(e.into(), entities::WORKFLOW, &workflow.id))
    }

    async fn save_stage(&self, ctx: &RequestContext, stage: &Stage) -> Result<()> {
        ctx.run("stage.update", self.stage_repo.update(ctx, stage))
            .await
            .map_err(|e| persistence_context(e.into(), entities::STAGE, &stage.id))
    }

    async fn save_activity(&self, ctx: &RequestContext, activity: &Activity) -> Result<()> {
        ctx.run("activity.update", self.activity_repo.update(ctx, activity))
            .await
            .map_err(|e| persistence_context(e.into(), entities::ACTIVITY, &activity.id))
    }
}

fn persistence_context(error: WorkflowError, entity: &str, id: &str) -> WorkflowError {
    match error {
        WorkflowError::Persistence(reason) => {
            WorkflowError::Persistence(format!("failed to save {entity} {id}: {reason}"))
        }
        other => other,
    }
}
