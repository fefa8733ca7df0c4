//! Repository operations for `WorkflowStep` rows.

use sqlx::{PgPool, Row};

use crate::error::{Error, Result};

use super::models::{NewWorkflowStep, StepType, WorkflowStep};

fn from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowStep> {
    Ok(WorkflowStep {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        step_order: row.try_get("step_order")?,
        step_type: row
            .try_get::<String, _>("step_type")?
            .parse()
            .map_err(Error::Other)?,
        agent_id: row.try_get("agent_id")?,
        name: row.try_get("name")?,
        input_mapping: row.try_get("input_mapping")?,
        output_variable: row.try_get("output_variable")?,
        condition_expression: row.try_get("condition_expression")?,
        depends_on: row.try_get("depends_on")?,
        approval_config: row.try_get("approval_config")?,
        retry_config: row.try_get("retry_config")?,
        timeout_seconds: row.try_get("timeout_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}

fn validate(step: &NewWorkflowStep) -> Result<()> {
    if matches!(step.step_type, StepType::Agent) != step.agent_id.is_some() {
        return Err(Error::InvalidArgument(
            "step_type=agent iff agent_id is set".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(db: &PgPool, step: NewWorkflowStep) -> Result<WorkflowStep> {
    validate(&step)?;

    let row = sqlx::query(
        r#"
        INSERT INTO workflow_steps (
            workflow_id, step_order, step_type, agent_id, name, input_mapping,
            output_variable, condition_expression, depends_on, approval_config,
            retry_config, timeout_seconds
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(step.workflow_id)
    .bind(step.step_order)
    .bind(step.step_type.to_string())
    .bind(step.agent_id)
    .bind(&step.name)
    .bind(&step.input_mapping)
    .bind(&step.output_variable)
    .bind(&step.condition_expression)
    .bind(&step.depends_on)
    .bind(&step.approval_config)
    .bind(&step.retry_config)
    .bind(step.timeout_seconds)
    .fetch_one(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => Error::InvalidArgument(
            format!("step order {} already used in workflow {}", step.step_order, step.workflow_id),
        ),
        other => Error::Sql(other),
    })?;

    from_row(&row)
}

pub async fn get(db: &PgPool, id: i64) -> Result<WorkflowStep> {
    let row = sqlx::query("SELECT * FROM workflow_steps WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workflow step {id}")))?;

    from_row(&row)
}

/// Steps for a workflow, ascending by step order (spec §4.6 step loop 1).
pub async fn list_for_workflow(db: &PgPool, workflow_id: i64) -> Result<Vec<WorkflowStep>> {
    let rows = sqlx::query("SELECT * FROM workflow_steps WHERE workflow_id = $1 ORDER BY step_order ASC")
        .bind(workflow_id)
        .fetch_all(db)
        .await?;

    rows.iter().map(from_row).collect()
}

pub async fn delete(db: &PgPool, id: i64) -> Result<()> {
    let rows_affected = sqlx::query("DELETE FROM workflow_steps WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(Error::NotFound(format!("workflow step {id}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_step() -> NewWorkflowStep {
        NewWorkflowStep {
            workflow_id: 1,
            step_order: 0,
            step_type: StepType::Condition,
            agent_id: None,
            name: "check".to_string(),
            input_mapping: None,
            output_variable: None,
            condition_expression: Some("${x}".to_string()),
            depends_on: vec![],
            approval_config: None,
            retry_config: None,
            timeout_seconds: 300,
        }
    }

    #[test]
    fn agent_step_requires_agent_id() {
        let mut step = base_step();
        step.step_type = StepType::Agent;
        assert!(validate(&step).is_err());

        step.agent_id = Some(7);
        assert!(validate(&step).is_ok());
    }

    #[test]
    fn non_agent_step_rejects_agent_id() {
        let mut step = base_step();
        step.agent_id = Some(7);
        assert!(validate(&step).is_err());
    }
}
