//! Repository operations for `Workflow` rows.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{NewWorkflow, Workflow};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<Workflow> {
    Ok(Workflow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        trigger_type: row
            .try_get::<String, _>("trigger_type")?
            .parse()
            .map_err(Error::Other)?,
        trigger_config: row.try_get("trigger_config")?,
        execution_mode: row
            .try_get::<String, _>("execution_mode")?
            .parse()
            .map_err(Error::Other)?,
        active: row.try_get("active")?,
        input_schema: row.try_get("input_schema")?,
        interface_type: row.try_get("interface_type")?,
        public: row.try_get("public")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create(db: &PgPool, workflow: NewWorkflow) -> Result<Workflow> {
    let row = sqlx::query(
        r#"
        INSERT INTO workflows (
            name, description, trigger_type, trigger_config, execution_mode,
            active, input_schema, interface_type, public
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(&workflow.name)
    .bind(&workflow.description)
    .bind(workflow.trigger_type.to_string())
    .bind(&workflow.trigger_config)
    .bind(workflow.execution_mode.to_string())
    .bind(workflow.active)
    .bind(&workflow.input_schema)
    .bind(&workflow.interface_type)
    .bind(workflow.public)
    .fetch_one(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::InvalidArgument(format!("workflow name already exists: {}", workflow.name))
        }
        other => Error::Sql(other),
    })?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<Workflow> {
    let row = sqlx::query("SELECT * FROM workflows WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workflow {id}")))?;

    from_row(&row)
}

pub async fn list(db: &PgPool, active_only: bool) -> Result<Vec<Workflow>> {
    let query = if active_only {
        "SELECT * FROM workflows WHERE active = true ORDER BY name"
    } else {
        "SELECT * FROM workflows ORDER BY name"
    };

    let rows = sqlx::query(query).fetch_all(db).await?;
    rows.iter().map(from_row).collect()
}

pub async fn set_active(db: &PgPool, id: i64, active: bool) -> Result<()> {
    let rows_affected = sqlx::query("UPDATE workflows SET active = $1, updated_at = NOW() WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("workflow {id}")));
    }

    Ok(())
}

pub async fn delete(db: &PgPool, id: i64) -> Result<()> {
    let rows_affected = sqlx::query("DELETE FROM workflows WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("workflow {id}")));
    }

    Ok(())
}

