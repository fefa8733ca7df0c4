//! Repository operations for `AgentExecution` rows.
//!
//! One row per LLM-agent invocation (spec §4.5); created at invocation and
//! finalized in the same transaction as completion or failure.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{AgentExecution, AgentExecutionStatus};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<AgentExecution> {
    Ok(AgentExecution {
        id: row.try_get("id")?,
        workflow_execution_id: row.try_get("workflow_execution_id")?,
        workflow_step_id: row.try_get("workflow_step_id")?,
        agent_id: row.try_get("agent_id")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(Error::Other)?,
        input: row.try_get("input")?,
        output: row.try_get("output")?,
        tokens_used: row.try_get("tokens_used")?,
        elapsed_ms: row.try_get("elapsed_ms")?,
        error_message: row.try_get("error_message")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Create a `running` row at invocation time (spec §4.5 step 2).
pub async fn create(
    db: &PgPool,
    workflow_execution_id: Option<i64>,
    workflow_step_id: Option<i64>,
    agent_id: i64,
    input: serde_json::Value,
) -> Result<AgentExecution> {
    let row = sqlx::query(
        r#"
        INSERT INTO agent_executions
            (workflow_execution_id, workflow_step_id, agent_id, status, input, started_at)
        VALUES ($1, $2, $3, 'running', $4, NOW())
        RETURNING *
        "#,
    )
    .bind(workflow_execution_id)
    .bind(workflow_step_id)
    .bind(agent_id)
    .bind(&input)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

/// Finalize a row as completed, recording output, token usage, and elapsed time.
pub async fn complete(
    db: &PgPool,
    id: i64,
    output: serde_json::Value,
    tokens_used: i32,
    elapsed_ms: i64,
) -> Result<AgentExecution> {
    let row = sqlx::query(
        r#"
        UPDATE agent_executions
        SET status = 'completed', output = $1, tokens_used = $2, elapsed_ms = $3, completed_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&output)
    .bind(tokens_used)
    .bind(elapsed_ms)
    .bind(id)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

/// Finalize a row as failed, recording the error message and elapsed time.
pub async fn fail(db: &PgPool, id: i64, error_message: &str, elapsed_ms: i64) -> Result<AgentExecution> {
    let row = sqlx::query(
        r#"
        UPDATE agent_executions
        SET status = 'failed', error_message = $1, elapsed_ms = $2, completed_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(error_message)
    .bind(elapsed_ms)
    .bind(id)
    .fetch_one(db)
    .await?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<AgentExecution> {
    let row = sqlx::query("SELECT * FROM agent_executions WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("agent execution {id}")))?;

    from_row(&row)
}

/// Agent-executions belonging to one workflow execution, oldest first.
pub async fn list_for_workflow_execution(
    db: &PgPool,
    workflow_execution_id: i64,
) -> Result<Vec<AgentExecution>> {
    let rows = sqlx::query(
        "SELECT * FROM agent_executions WHERE workflow_execution_id = $1 ORDER BY started_at ASC",
    )
    .bind(workflow_execution_id)
    .fetch_all(db)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn list(
    db: &PgPool,
    status: Option<AgentExecutionStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AgentExecution>> {
    let mut query = String::from("SELECT * FROM agent_executions WHERE 1=1");
    let mut bind_count = 0;

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
    if let Some(s) = status {
        q = q.bind(s.to_string());
    }
    q = q.bind(limit).bind(offset);

    let rows = q.fetch_all(db).await?;
    rows.iter().map(from_row).collect()
}
