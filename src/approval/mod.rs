//! Approval coordinator (spec §4.7): the human-in-the-loop half of the
//! step loop. Creation of a pending request happens inside the
//! orchestrator's own step handling (it owns the execution's pause); this
//! module is the other side — turning a human decision (or a timeout
//! sweep) back into an execution transition.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use crate::error::Result;
use crate::observability;
use crate::orchestrator::{ExecutionOutcome, Orchestrator};
use crate::store::{approval_requests, workflow_executions};
use crate::store::models::ExecutionStatus;

pub struct ApprovalCoordinator {
    pool: PgPool,
    orchestrator: Arc<Orchestrator>,
}

impl ApprovalCoordinator {
    pub fn new(pool: PgPool, orchestrator: Arc<Orchestrator>) -> Self {
        Self { pool, orchestrator }
    }

    /// Approve a pending request and resume its execution in place
    /// (spec §4.7 `approve`).
    pub async fn approve(
        &self,
        request_id: i64,
        approver: &str,
        comments: Option<&str>,
    ) -> Result<ExecutionOutcome> {
        let approval = approval_requests::approve(&self.pool, request_id, approver, comments).await?;

        if let Some(m) = observability::metrics() {
            m.record_approval_approved();
        }

        tracing::info!(
            approval_request_id = approval.id,
            execution_id = approval.workflow_execution_id,
            approver,
            "approval request approved"
        );

        self.orchestrator
            .resume(approval.workflow_execution_id, approval.id)
            .await
    }

    /// Reject a pending request; the owning execution fails immediately
    /// rather than resuming (spec §4.7 `reject`).
    pub async fn reject(&self, request_id: i64, approver: &str, reason: &str) -> Result<()> {
        let approval = approval_requests::reject(&self.pool, request_id, approver, reason).await?;

        if let Some(m) = observability::metrics() {
            m.record_approval_rejected();
        }

        tracing::info!(
            approval_request_id = approval.id,
            execution_id = approval.workflow_execution_id,
            approver,
            reason,
            "approval request rejected"
        );

        self.fail_execution(
            approval.workflow_execution_id,
            &format!("Approval rejected: {reason}"),
        )
        .await
    }

    /// Sweep overdue pending requests, timing each out and failing its
    /// owning execution (spec §4.7 `processTimeouts`). Returns the number
    /// of requests processed.
    pub async fn process_timeouts(&self) -> Result<usize> {
        let overdue = approval_requests::list_overdue(&self.pool, Utc::now()).await?;
        let mut processed = 0;

        for request in overdue {
            match approval_requests::timeout(&self.pool, request.id).await {
                Ok(approval) => {
                    if let Some(m) = observability::metrics() {
                        m.record_approval_timed_out();
                    }
                    tracing::info!(
                        approval_request_id = approval.id,
                        execution_id = approval.workflow_execution_id,
                        "approval request timed out"
                    );
                    self.fail_execution(approval.workflow_execution_id, "approval timed out")
                        .await?;
                    processed += 1;
                }
                Err(e) => {
                    // Lost the race with a concurrent approve/reject; the
                    // request is no longer pending, nothing to do.
                    tracing::debug!(approval_request_id = request.id, error = %e, "timeout transition skipped");
                }
            }
        }

        Ok(processed)
    }

    async fn fail_execution(&self, execution_id: i64, message: &str) -> Result<()> {
        workflow_executions::set_status(
            &self.pool,
            execution_id,
            ExecutionStatus::Failed,
            None,
            Some(message),
        )
        .await
    }
}
