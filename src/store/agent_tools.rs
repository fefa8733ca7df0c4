//! Repository operations for the `agent_tools` assignment table.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::AgentTool;

fn from_row(row: &sqlx::postgres::PgRow) -> Result<AgentTool> {
    Ok(AgentTool {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        tool_id: row.try_get("tool_id")?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn assign(
    db: &PgPool,
    agent_id: i64,
    tool_id: i64,
    config: Option<serde_json::Value>,
) -> Result<AgentTool> {
    let row = sqlx::query(
        r#"
        INSERT INTO agent_tools (agent_id, tool_id, config)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(agent_id)
    .bind(tool_id)
    .bind(&config)
    .fetch_one(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::InvalidArgument(format!("tool {tool_id} already assigned to agent {agent_id}"))
        }
        other => Error::Sql(other),
    })?;

    from_row(&row)
}

pub async fn remove(db: &PgPool, agent_id: i64, tool_id: i64) -> Result<()> {
    let rows_affected = sqlx::query("DELETE FROM agent_tools WHERE agent_id = $1 AND tool_id = $2")
        .bind(agent_id)
        .bind(tool_id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!(
            "no assignment of tool {tool_id} to agent {agent_id}"
        )));
    }

    Ok(())
}

pub async fn list_for_agent(db: &PgPool, agent_id: i64) -> Result<Vec<AgentTool>> {
    let rows = sqlx::query("SELECT * FROM agent_tools WHERE agent_id = $1 ORDER BY id")
        .bind(agent_id)
        .fetch_all(db)
        .await?;

    rows.iter().map(from_row).collect()
}
