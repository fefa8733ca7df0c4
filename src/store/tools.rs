//! Repository operations for `Tool` rows.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{NewTool, Tool, ToolType};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<Tool> {
    Ok(Tool {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tool_type: row
            .try_get::<String, _>("tool_type")?
            .parse()
            .map_err(Error::Other)?,
        description: row.try_get("description")?,
        input_schema: row.try_get("input_schema")?,
        handler: row.try_get("handler")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create(db: &PgPool, tool: NewTool) -> Result<Tool> {
    let row = sqlx::query(
        r#"
        INSERT INTO tools (name, tool_type, description, input_schema, handler, active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&tool.name)
    .bind(tool.tool_type.to_string())
    .bind(&tool.description)
    .bind(&tool.input_schema)
    .bind(&tool.handler)
    .bind(tool.active)
    .fetch_one(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::InvalidArgument(format!("tool name already exists: {}", tool.name))
        }
        other => Error::Sql(other),
    })?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<Tool> {
    let row = sqlx::query("SELECT * FROM tools WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("tool {id}")))?;

    from_row(&row)
}

pub async fn get_by_name(db: &PgPool, name: &str) -> Result<Tool> {
    let row = sqlx::query("SELECT * FROM tools WHERE name = $1")
        .bind(name)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("tool {name}")))?;

    from_row(&row)
}

pub async fn list(db: &PgPool, tool_type: Option<ToolType>, active_only: bool) -> Result<Vec<Tool>> {
    let mut query = String::from("SELECT * FROM tools WHERE 1=1");
    let mut bind_count = 0;

    if tool_type.is_some() {
        bind_count += 1;
        query.push_str(&format!(" AND tool_type = ${bind_count}"));
    }
    if active_only {
        query.push_str(" AND active = true");
    }
    query.push_str(" ORDER BY name");

    let mut q = sqlx::query(&query);
    if let Some(tt) = tool_type {
        q = q.bind(tt.to_string());
    }

    let rows = q.fetch_all(db).await?;
    rows.iter().map(from_row).collect()
}

pub async fn set_active(db: &PgPool, id: i64, active: bool) -> Result<()> {
    let rows_affected = sqlx::query("UPDATE tools SET active = $1, updated_at = NOW() WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("tool {id}")));
    }

    Ok(())
}

pub async fn delete(db: &PgPool, id: i64) -> Result<()> {
    let rows_affected = sqlx::query("DELETE FROM tools WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("tool {id}")));
    }

    Ok(())
}
