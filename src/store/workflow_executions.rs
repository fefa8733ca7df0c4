//! Repository operations for `WorkflowExecution` rows.
//!
//! The orchestrator is the sole writer of the `context` document (spec §3
//! ownership note); every mutation here takes the whole replacement value
//! rather than attempting a partial JSON merge in SQL.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{ExecutionStatus, WorkflowExecution};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowExecution> {
    Ok(WorkflowExecution {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(Error::Other)?,
        trigger_data: row.try_get("trigger_data")?,
        context: row.try_get("context")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create(
    db: &PgPool,
    workflow_id: i64,
    trigger_data: serde_json::Value,
    initial_context: serde_json::Value,
) -> Result<WorkflowExecution> {
    let row = sqlx::query(
        r#"
        INSERT INTO workflow_executions (workflow_id, status, trigger_data, context, started_at)
        VALUES ($1, 'pending', $2, $3, NOW())
        RETURNING *
        "#,
    )
    .bind(workflow_id)
    .bind(&trigger_data)
    .bind(&initial_context)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<WorkflowExecution> {
    let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workflow execution {id}")))?;

    from_row(&row)
}

/// Persist the in-memory context document (called after each step and at
/// terminal transitions, per spec §5 "Shared resources").
pub async fn save_context(db: &PgPool, id: i64, context: &serde_json::Value) -> Result<()> {
    sqlx::query("UPDATE workflow_executions SET context = $1, updated_at = NOW() WHERE id = $2")
        .bind(context)
        .bind(id)
        .execute(db)
        .await?;

    Ok(())
}

/// Transition status, optionally updating context and/or error message and
/// stamping `completed_at` when the new status is terminal or paused-from.
pub async fn set_status(
    db: &PgPool,
    id: i64,
    status: ExecutionStatus,
    context: Option<&serde_json::Value>,
    error_message: Option<&str>,
) -> Result<()> {
    let stamp_completed = status.is_terminal();

    sqlx::query(
        r#"
        UPDATE workflow_executions
        SET status = $1,
            context = COALESCE($2, context),
            error_message = COALESCE($3, error_message),
            completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE id = $5
        "#,
    )
    .bind(status.to_string())
    .bind(context)
    .bind(error_message)
    .bind(stamp_completed)
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn list(
    db: &PgPool,
    workflow_id: Option<i64>,
    status: Option<ExecutionStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<WorkflowExecution>> {
    let mut query = String::from("SELECT * FROM workflow_executions WHERE 1=1");
    let mut bind_count = 0;

    if workflow_id.is_some() {
        bind_count += 1;
        query.push_str(&format!(" AND workflow_id = ${bind_count}"));
    }
    if status.is_some() {
        bind_count += 1;
        query.push_str(&format!(" AND status = ${bind_count}"));
    }
    query.push_str(" ORDER BY started_at DESC");
    bind_count += 1;
    query.push_str(&format!(" LIMIT ${bind_count}"));
    bind_count += 1;
    query.push_str(&format!(" OFFSET ${bind_count}"));

    let mut q = sqlx::query(&query);
    if let Some(wid) = workflow_id {
        q = q.bind(wid);
    }
    if let Some(s) = status {
        q = q.bind(s.to_string());
    }
    q = q.bind(limit).bind(offset);

    let rows = q.fetch_all(db).await?;
    rows.iter().map(from_row).collect()
}
