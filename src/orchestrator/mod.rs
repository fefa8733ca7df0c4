//! Orchestrator (spec §4.6): the central state machine that iterates a
//! workflow's ordered steps against a mutable context, handling condition
//! evaluation, dependency checks, timeouts, retries, parallel groups, and
//! approval suspension.

pub mod retry;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::agent::AgentRunner;
use crate::error::{Error, Result};
use crate::expression;
use crate::observability;
use crate::projector;
use crate::store::models::{ExecutionStatus, StepType, WorkflowStep};
use crate::store::{approval_requests, workflow_executions, workflow_steps, workflows};

use retry::RetryConfig;

const DEFAULT_STEP_TIMEOUT_SECONDS: i64 = 300;

/// The outcome of driving a workflow execution to completion or
/// suspension (spec §4.6 `start`/`resume` contract).
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed { execution_id: i64, context: Value },
    Paused { execution_id: i64 },
    Failed { execution_id: i64, error: String },
}

pub struct Orchestrator {
    pool: PgPool,
    agent_runner: Arc<AgentRunner>,
}

impl Orchestrator {
    pub fn new(pool: PgPool, agent_runner: Arc<AgentRunner>) -> Self {
        Self { pool, agent_runner }
    }

    /// Create and run an execution to a terminal or paused state
    /// (spec §4.6 `start`).
    pub async fn start(&self, workflow_id: i64, trigger_data: Value) -> Result<ExecutionOutcome> {
        let workflow = workflows::get(&self.pool, workflow_id).await?;
        if !workflow.active {
            return Err(Error::Inactive(format!(
                "workflow {} ({})",
                workflow.id, workflow.name
            )));
        }

        let initial_context = json!({ "trigger": trigger_data.clone() });
        let execution =
            workflow_executions::create(&self.pool, workflow_id, trigger_data, initial_context.clone()).await?;

        workflow_executions::set_status(&self.pool, execution.id, ExecutionStatus::Running, None, None).await?;

        if let Some(m) = observability::metrics() {
            m.record_execution_started();
        }

        tracing::info!(execution_id = execution.id, workflow_id, "workflow execution started");

        let steps = workflow_steps::list_for_workflow(&self.pool, workflow_id).await?;
        self.run_steps(execution.id, steps, 0, initial_context, HashSet::new())
            .await
    }

    /// Resume a paused execution after an approval decision (spec §4.6.3).
    ///
    /// Re-enters the step loop directly (SPEC_FULL §B.2): no separate poll
    /// worker, the approval coordinator calls this synchronously from
    /// `approve()`.
    pub async fn resume(&self, execution_id: i64, approval_id: i64) -> Result<ExecutionOutcome> {
        let execution = workflow_executions::get(&self.pool, execution_id).await?;
        if execution.status != ExecutionStatus::Paused {
            return Err(Error::InvalidState(format!(
                "execution {execution_id} is not paused (status={})",
                execution.status
            )));
        }

        let approval = approval_requests::get(&self.pool, approval_id).await?;
        if approval.workflow_execution_id != execution_id {
            return Err(Error::InvalidArgument(format!(
                "approval {approval_id} does not belong to execution {execution_id}"
            )));
        }

        let steps = workflow_steps::list_for_workflow(&self.pool, execution.workflow_id).await?;
        let approval_step = steps
            .iter()
            .find(|s| s.id == approval.workflow_step_id)
            .ok_or_else(|| Error::NotFound(format!("workflow step {}", approval.workflow_step_id)))?;

        let mut context = execution.context.clone();
        if let Some(var) = &approval_step.output_variable {
            set_context_var(
                &mut context,
                var,
                json!({
                    "approved": true,
                    "approved_by": approval.approver,
                    "comments": approval.comments,
                }),
            );
        }

        let completed: HashSet<i32> = steps
            .iter()
            .take_while(|s| s.id != approval_step.id)
            .map(|s| s.step_order)
            .chain(std::iter::once(approval_step.step_order))
            .collect();

        let resume_index = steps
            .iter()
            .position(|s| s.id == approval_step.id)
            .map(|i| i + 1)
            .unwrap_or(steps.len());

        workflow_executions::set_status(&self.pool, execution_id, ExecutionStatus::Running, Some(&context), None)
            .await?;

        tracing::info!(execution_id, approval_id, "workflow execution resumed after approval");

        self.run_steps(execution_id, steps, resume_index, context, completed)
            .await
    }

    async fn run_steps(
        &self,
        execution_id: i64,
        steps: Vec<WorkflowStep>,
        start_index: usize,
        mut context: Value,
        mut completed: HashSet<i32>,
    ) -> Result<ExecutionOutcome> {
        let mut idx = start_index;

        while idx < steps.len() {
            let step = &steps[idx];

            if let Some(expr) = &step.condition_expression {
                let outcome = expression::evaluate(expr, &context);
                if let Some(diagnostic) = &outcome.diagnostic {
                    tracing::warn!(execution_id, step_order = step.step_order, %diagnostic, "condition evaluation diagnostic");
                    push_diagnostic(&mut context, diagnostic);
                }
                // Convention observed in the source: the condition is a
                // skip predicate. true => skip the step (spec §4.6 step 2a).
                if outcome.value {
                    tracing::info!(execution_id, step_order = step.step_order, "step skipped by condition");
                    idx += 1;
                    continue;
                }
            }

            if !dependencies_met(step, &completed) {
                return self
                    .fail(execution_id, &context, Error::DependencyUnmet(step.name.clone()))
                    .await;
            }

            // Parallel fan-out: consecutive `parallel` steps sharing the
            // same `depends_on` form one group (SPEC_FULL §B.3).
            if step.step_type == StepType::Parallel {
                let mut group_end = idx + 1;
                while group_end < steps.len()
                    && steps[group_end].step_type == StepType::Parallel
                    && steps[group_end].depends_on == step.depends_on
                {
                    group_end += 1;
                }
                let group = &steps[idx..group_end];

                match self.run_parallel_group(execution_id, group, &context).await {
                    Ok(merged) => {
                        for (step, output) in group.iter().zip(merged.into_iter()) {
                            if let Some(var) = &step.output_variable {
                                set_context_var(&mut context, var, output);
                            }
                            completed.insert(step.step_order);
                        }
                        workflow_executions::save_context(&self.pool, execution_id, &context).await?;
                        idx = group_end;
                        continue;
                    }
                    Err(e) => return self.fail(execution_id, &context, e).await,
                }
            }

            match self.run_step_with_retry(execution_id, step, &context).await {
                Ok(StepOutcome::Output(output)) => {
                    if let Some(var) = &step.output_variable {
                        set_context_var(&mut context, var, output);
                    }
                    completed.insert(step.step_order);
                    workflow_executions::save_context(&self.pool, execution_id, &context).await?;
                    idx += 1;
                }
                Ok(StepOutcome::Paused) => {
                    return Ok(ExecutionOutcome::Paused { execution_id });
                }
                Err(e) => return self.fail(execution_id, &context, e).await,
            }
        }

        workflow_executions::set_status(
            &self.pool,
            execution_id,
            ExecutionStatus::Completed,
            Some(&context),
            None,
        )
        .await?;

        if let Some(m) = observability::metrics() {
            m.record_execution_completed();
        }

        tracing::info!(execution_id, "workflow execution completed");

        Ok(ExecutionOutcome::Completed { execution_id, context })
    }

    async fn fail(&self, execution_id: i64, context: &Value, error: Error) -> Result<ExecutionOutcome> {
        let message = error.to_string();
        workflow_executions::set_status(
            &self.pool,
            execution_id,
            ExecutionStatus::Failed,
            Some(context),
            Some(&message),
        )
        .await?;

        if let Some(m) = observability::metrics() {
            m.record_execution_failed();
        }

        tracing::warn!(execution_id, error = %message, "workflow execution failed");

        Ok(ExecutionOutcome::Failed {
            execution_id,
            error: message,
        })
    }

    /// Run one step, retrying retryable failures per its `retry_config`
    /// (spec §4.6.1 / §4.6 step 2e).
    async fn run_step_with_retry(
        &self,
        execution_id: i64,
        step: &WorkflowStep,
        context: &Value,
    ) -> Result<StepOutcome> {
        let retry_config = RetryConfig::from_json(step.retry_config.as_ref());
        let mut failures: u32 = 0;

        loop {
            // Re-fetch and validate the execution is still running before
            // each attempt so a concurrent resume can't race it
            // (SPEC_FULL §B.4).
            let execution = workflow_executions::get(&self.pool, execution_id).await?;
            if execution.status != ExecutionStatus::Running {
                return Err(Error::InvalidState(format!(
                    "execution {execution_id} is no longer running (status={})",
                    execution.status
                )));
            }

            match self.run_step(execution_id, step, context).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    failures += 1;
                    let Some(cfg) = retry_config else {
                        return Err(e);
                    };
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if failures >= cfg.max_retries {
                        return Err(Error::MaxRetriesExceeded(e.to_string()));
                    }
                    let delay = cfg.delay_for_attempt(failures - 1);
                    tracing::info!(
                        execution_id,
                        step_order = step.step_order,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying step after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Dispatch one step by type (spec §4.6 step 2c).
    async fn run_step(&self, execution_id: i64, step: &WorkflowStep, context: &Value) -> Result<StepOutcome> {
        let started = Instant::now();
        let outcome = self.run_step_inner(execution_id, step, context).await;
        if let Some(m) = observability::metrics() {
            m.record_step_duration(&step.step_type.to_string(), started.elapsed().as_secs_f64());
        }
        outcome
    }

    async fn run_step_inner(&self, execution_id: i64, step: &WorkflowStep, context: &Value) -> Result<StepOutcome> {
        let timeout_seconds = if step.timeout_seconds > 0 {
            step.timeout_seconds as i64
        } else {
            DEFAULT_STEP_TIMEOUT_SECONDS
        };
        let deadline = Duration::from_secs(timeout_seconds as u64);

        match step.step_type {
            StepType::Agent => {
                let agent_id = step
                    .agent_id
                    .ok_or_else(|| Error::InvalidArgument(format!("step {} has no agent", step.name)))?;
                let input = projector::project(step.input_mapping.as_ref(), context);

                let started = Instant::now();
                let result = tokio::time::timeout(
                    deadline,
                    self.agent_runner.run(agent_id, input, Some(execution_id), Some(step.id)),
                )
                .await;

                match result {
                    Ok(Ok(run_result)) => Ok(StepOutcome::Output(run_result.output)),
                    Ok(Err(e)) => Err(e),
                    Err(_elapsed) => {
                        tracing::warn!(
                            execution_id,
                            step_order = step.step_order,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "step timed out"
                        );
                        Err(Error::StepTimeout(deadline))
                    }
                }
            }
            StepType::Condition => Ok(StepOutcome::Output(json!({ "skipped": true }))),
            StepType::Approval => self.run_approval_step(execution_id, step, context).await,
            StepType::Parallel => {
                // Single-member group (no neighbors share its depends_on);
                // run it the same way a group of one would.
                let merged = self.run_parallel_group(execution_id, std::slice::from_ref(step), context).await?;
                Ok(StepOutcome::Output(merged.into_iter().next().unwrap_or(Value::Null)))
            }
        }
    }

    async fn run_approval_step(
        &self,
        execution_id: i64,
        step: &WorkflowStep,
        context: &Value,
    ) -> Result<StepOutcome> {
        let mapping = projector::project(step.input_mapping.as_ref(), context);
        let required_role = mapping.get("requiredRole").and_then(Value::as_str).map(str::to_string);
        let timeout_minutes = mapping.get("timeoutMinutes").and_then(Value::as_i64);
        let timeout_at = timeout_minutes.map(|minutes| Utc::now() + ChronoDuration::minutes(minutes));

        let request = approval_requests::create(
            &self.pool,
            execution_id,
            step.id,
            required_role.as_deref(),
            timeout_at,
        )
        .await?;

        if let Some(m) = observability::metrics() {
            m.record_approval_created();
        }

        tracing::info!(
            execution_id,
            step_order = step.step_order,
            approval_request_id = request.id,
            "approval requested, pausing execution"
        );

        let mut paused_context = context.clone();
        if let Some(var) = &step.output_variable {
            set_context_var(
                &mut paused_context,
                var,
                json!({ "status": "PENDING", "message": "Waiting for approval" }),
            );
        }

        workflow_executions::set_status(
            &self.pool,
            execution_id,
            ExecutionStatus::Paused,
            Some(&paused_context),
            None,
        )
        .await?;

        Ok(StepOutcome::Paused)
    }

    /// Run a fan-out group concurrently, capturing sub-step failures into
    /// the merged output rather than aborting the group (spec §4.6.2).
    async fn run_parallel_group(
        &self,
        execution_id: i64,
        group: &[WorkflowStep],
        context: &Value,
    ) -> Result<Vec<Value>> {
        let futures = group.iter().map(|step| {
            let context = context.clone();
            async move {
                let input = projector::project(step.input_mapping.as_ref(), &context);
                let deadline = Duration::from_secs(if step.timeout_seconds > 0 {
                    step.timeout_seconds as u64
                } else {
                    DEFAULT_STEP_TIMEOUT_SECONDS as u64
                });

                let outcome = match step.step_type {
                    StepType::Agent => {
                        let Some(agent_id) = step.agent_id else {
                            return json!({ "error": "step has no agent", "stepName": step.name });
                        };
                        match tokio::time::timeout(
                            deadline,
                            self.agent_runner.run(agent_id, input, Some(execution_id), Some(step.id)),
                        )
                        .await
                        {
                            Ok(Ok(result)) => result.output,
                            Ok(Err(e)) => json!({ "error": e.to_string(), "stepName": step.name }),
                            Err(_) => json!({ "error": "step timed out", "stepName": step.name }),
                        }
                    }
                    StepType::Condition => json!({ "skipped": true }),
                    _ => json!({ "error": "unsupported step type in parallel group", "stepName": step.name }),
                };
                outcome
            }
        });

        Ok(join_all(futures).await)
    }
}

enum StepOutcome {
    Output(Value),
    Paused,
}

fn dependencies_met(step: &WorkflowStep, completed: &HashSet<i32>) -> bool {
    step.depends_on.iter().all(|dep| completed.contains(dep))
}

fn set_context_var(context: &mut Value, var: &str, value: Value) {
    if let Some(obj) = context.as_object_mut() {
        obj.insert(var.to_string(), value);
    }
}

fn push_diagnostic(context: &mut Value, diagnostic: &str) {
    if let Some(obj) = context.as_object_mut() {
        let entry = obj.entry("_diagnostics").or_insert_with(|| json!([]));
        if let Some(arr) = entry.as_array_mut() {
            arr.push(json!(diagnostic));
        }
    }
}
