//! Repository operations for `ApprovalRequest` rows.
//!
//! Invariant (spec §4.7): a given execution is paused iff it has exactly
//! one pending request owned by its current step. The store enforces the
//! "at most one pending request per (execution, step)" half of that via a
//! partial unique index in the migration; the orchestrator and approval
//! coordinator are responsible for the rest.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{ApprovalRequest, ApprovalStatus};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<ApprovalRequest> {
    Ok(ApprovalRequest {
        id: row.try_get("id")?,
        workflow_execution_id: row.try_get("workflow_execution_id")?,
        workflow_step_id: row.try_get("workflow_step_id")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(Error::Other)?,
        required_role: row.try_get("required_role")?,
        approver: row.try_get("approver")?,
        decided_at: row.try_get("decided_at")?,
        comments: row.try_get("comments")?,
        timeout_at: row.try_get("timeout_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Create a pending request (spec §4.7 `createApprovalRequest`).
pub async fn create(
    db: &PgPool,
    workflow_execution_id: i64,
    workflow_step_id: i64,
    required_role: Option<&str>,
    timeout_at: Option<DateTime<Utc>>,
) -> Result<ApprovalRequest> {
    let row = sqlx::query(
        r#"
        INSERT INTO approval_requests
            (workflow_execution_id, workflow_step_id, status, required_role, timeout_at)
        VALUES ($1, $2, 'pending', $3, $4)
        RETURNING *
        "#,
    )
    .bind(workflow_execution_id)
    .bind(workflow_step_id)
    .bind(required_role)
    .bind(timeout_at)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<ApprovalRequest> {
    let row = sqlx::query("SELECT * FROM approval_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("approval request {id}")))?;

    from_row(&row)
}

/// The pending request for an execution, if any (spec §4.7 invariant).
pub async fn get_pending_for_execution(
    db: &PgPool,
    workflow_execution_id: i64,
) -> Result<Option<ApprovalRequest>> {
    let row = sqlx::query(
        "SELECT * FROM approval_requests WHERE workflow_execution_id = $1 AND status = 'pending'",
    )
    .bind(workflow_execution_id)
    .fetch_optional(db)
    .await?;

    row.map(|r| from_row(&r)).transpose()
}

/// Transition a pending request to `approved`, requiring status=pending
/// (spec §4.7 `approve`; idempotence law in §8: a second call on an
/// already-decided request is rejected rather than re-mutating).
pub async fn approve(
    db: &PgPool,
    id: i64,
    approver: &str,
    comments: Option<&str>,
) -> Result<ApprovalRequest> {
    transition(db, id, ApprovalStatus::Approved, Some(approver), comments).await
}

/// Transition a pending request to `rejected` (spec §4.7 `reject`).
pub async fn reject(db: &PgPool, id: i64, approver: &str, reason: &str) -> Result<ApprovalRequest> {
    transition(db, id, ApprovalStatus::Rejected, Some(approver), Some(reason)).await
}

/// Transition a pending request to `timeout` (spec §4.7 `processTimeouts`).
pub async fn timeout(db: &PgPool, id: i64) -> Result<ApprovalRequest> {
    transition(db, id, ApprovalStatus::Timeout, None, None).await
}

async fn transition(
    db: &PgPool,
    id: i64,
    status: ApprovalStatus,
    approver: Option<&str>,
    comments: Option<&str>,
) -> Result<ApprovalRequest> {
    let row = sqlx::query(
        r#"
        UPDATE approval_requests
        SET status = $1, approver = COALESCE($2, approver), comments = COALESCE($3, comments),
            decided_at = NOW()
        WHERE id = $4 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(status.to_string())
    .bind(approver)
    .bind(comments)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| {
        Error::InvalidState(format!("approval request {id} is not pending"))
    })?;

    from_row(&row)
}

/// Pending requests whose `timeout_at` has passed (spec §4.7 sweep input).
pub async fn list_overdue(db: &PgPool, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>> {
    let rows = sqlx::query(
        "SELECT * FROM approval_requests WHERE status = 'pending' AND timeout_at IS NOT NULL AND timeout_at <= $1",
    )
    .bind(now)
    .fetch_all(db)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Pending requests, optionally filtered by required role (spec §6.1 "list pending").
pub async fn list_pending(
    db: &PgPool,
    required_role: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ApprovalRequest>> {
    let rows = if let Some(role) = required_role {
        sqlx::query(
            "SELECT * FROM approval_requests WHERE status = 'pending' AND required_role = $1 \
             ORDER BY created_at ASC LIMIT $2 OFFSET $3",
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?
    } else {
        sqlx::query(
            "SELECT * FROM approval_requests WHERE status = 'pending' \
             ORDER BY created_at ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?
    };

    rows.iter().map(from_row).collect()
}

pub async fn count_pending(db: &PgPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM approval_requests WHERE status = 'pending'")
        .fetch_one(db)
        .await?;
    Ok(row.try_get("n")?)
}
