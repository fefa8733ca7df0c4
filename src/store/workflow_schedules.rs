//! Repository operations for `WorkflowSchedule` rows.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::Result;

use super::models::{NewWorkflowSchedule, WorkflowSchedule};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowSchedule> {
    Ok(WorkflowSchedule {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        cron_expression: row.try_get("cron_expression")?,
        enabled: row.try_get("enabled")?,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
        trigger_data: row.try_get("trigger_data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create a schedule; `next_run_at` is the caller-computed first fire
/// instant (spec §3: "the cron-computed instant following the later of
/// creation or last run").
pub async fn create(
    db: &PgPool,
    schedule: NewWorkflowSchedule,
    next_run_at: DateTime<Utc>,
) -> Result<WorkflowSchedule> {
    let row = sqlx::query(
        r#"
        INSERT INTO workflow_schedules (workflow_id, cron_expression, enabled, trigger_data, next_run_at)
        VALUES ($1, $2, true, $3, $4)
        RETURNING *
        "#,
    )
    .bind(schedule.workflow_id)
    .bind(&schedule.cron_expression)
    .bind(&schedule.trigger_data)
    .bind(next_run_at)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<Option<WorkflowSchedule>> {
    let row = sqlx::query("SELECT * FROM workflow_schedules WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;

    row.map(|r| from_row(&r)).transpose()
}

pub async fn get_by_workflow(db: &PgPool, workflow_id: i64) -> Result<Option<WorkflowSchedule>> {
    let row = sqlx::query("SELECT * FROM workflow_schedules WHERE workflow_id = $1")
        .bind(workflow_id)
        .fetch_optional(db)
        .await?;

    row.map(|r| from_row(&r)).transpose()
}

pub async fn list(db: &PgPool, enabled_only: bool) -> Result<Vec<WorkflowSchedule>> {
    let query = if enabled_only {
        "SELECT * FROM workflow_schedules WHERE enabled = true ORDER BY next_run_at ASC"
    } else {
        "SELECT * FROM workflow_schedules ORDER BY next_run_at ASC"
    };

    let rows = sqlx::query(query).fetch_all(db).await?;
    rows.iter().map(from_row).collect()
}

/// Schedules due to fire: `enabled AND next_run_at <= now` (spec §4.8 tick).
pub async fn list_due(db: &PgPool, now: DateTime<Utc>) -> Result<Vec<WorkflowSchedule>> {
    let rows = sqlx::query(
        "SELECT * FROM workflow_schedules WHERE enabled = true AND next_run_at <= $1 ORDER BY next_run_at ASC",
    )
    .bind(now)
    .fetch_all(db)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Advance `last_run_at`/`next_run_at` after a tick fires a schedule.
pub async fn advance(
    db: &PgPool,
    id: i64,
    last_run_at: DateTime<Utc>,
    next_run_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE workflow_schedules SET last_run_at = $1, next_run_at = $2, updated_at = NOW() WHERE id = $3",
    )
    .bind(last_run_at)
    .bind(next_run_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn set_enabled(db: &PgPool, id: i64, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE workflow_schedules SET enabled = $1, updated_at = NOW() WHERE id = $2")
        .bind(enabled)
        .bind(id)
        .execute(db)
        .await?;

    Ok(())
}

pub async fn update_cron(db: &PgPool, id: i64, cron_expression: &str, next_run_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "UPDATE workflow_schedules SET cron_expression = $1, next_run_at = $2, updated_at = NOW() WHERE id = $3",
    )
    .bind(cron_expression)
    .bind(next_run_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn update_trigger_data(db: &PgPool, id: i64, trigger_data: Option<serde_json::Value>) -> Result<()> {
    sqlx::query("UPDATE workflow_schedules SET trigger_data = $1, updated_at = NOW() WHERE id = $2")
        .bind(&trigger_data)
        .bind(id)
        .execute(db)
        .await?;

    Ok(())
}
