//! Small helpers for assembling the workflow/agent rows each scenario
//! test needs, so the scenario itself reads as setup + act + assert.

use serde_json::{json, Value};
use sqlx::PgPool;

use conveyor::store::models::{
    ExecutionMode, NewAgent, NewWorkflow, NewWorkflowStep, StepType, TriggerType,
};
use conveyor::store::{agents, workflow_steps, workflows};

pub async fn stub_agent(db: &PgPool, name: &str, model: &str) -> i64 {
    let agent = agents::create(
        db,
        NewAgent {
            name: name.to_string(),
            provider: "anthropic".to_string(),
            model: model.to_string(),
            system_prompt: "you are a test agent".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            config: json!({}),
            active: true,
        },
    )
    .await
    .expect("create agent");
    agent.id
}

pub async fn manual_workflow(db: &PgPool, name: &str) -> i64 {
    let workflow = workflows::create(
        db,
        NewWorkflow {
            name: name.to_string(),
            description: None,
            trigger_type: TriggerType::Manual,
            trigger_config: json!({}),
            execution_mode: ExecutionMode::Sync,
            active: true,
            input_schema: None,
            interface_type: "api".to_string(),
            public: false,
        },
    )
    .await
    .expect("create workflow");
    workflow.id
}

#[allow(clippy::too_many_arguments)]
pub async fn agent_step(
    db: &PgPool,
    workflow_id: i64,
    step_order: i32,
    agent_id: i64,
    name: &str,
    input_mapping: Option<Value>,
    output_variable: &str,
    depends_on: Vec<i32>,
    retry_config: Option<Value>,
) -> i64 {
    let step = workflow_steps::create(
        db,
        NewWorkflowStep {
            workflow_id,
            step_order,
            step_type: StepType::Agent,
            agent_id: Some(agent_id),
            name: name.to_string(),
            input_mapping,
            output_variable: Some(output_variable.to_string()),
            condition_expression: None,
            depends_on,
            approval_config: None,
            retry_config,
            timeout_seconds: 30,
        },
    )
    .await
    .expect("create agent step");
    step.id
}

pub async fn condition_step(
    db: &PgPool,
    workflow_id: i64,
    step_order: i32,
    name: &str,
    condition_expression: &str,
    output_variable: &str,
    depends_on: Vec<i32>,
) -> i64 {
    let step = workflow_steps::create(
        db,
        NewWorkflowStep {
            workflow_id,
            step_order,
            step_type: StepType::Condition,
            agent_id: None,
            name: name.to_string(),
            input_mapping: None,
            output_variable: Some(output_variable.to_string()),
            condition_expression: Some(condition_expression.to_string()),
            depends_on,
            approval_config: None,
            retry_config: None,
            timeout_seconds: 30,
        },
    )
    .await
    .expect("create condition step");
    step.id
}

pub async fn approval_step(
    db: &PgPool,
    workflow_id: i64,
    step_order: i32,
    name: &str,
    input_mapping: Option<Value>,
    output_variable: &str,
    depends_on: Vec<i32>,
) -> i64 {
    let step = workflow_steps::create(
        db,
        NewWorkflowStep {
            workflow_id,
            step_order,
            step_type: StepType::Approval,
            agent_id: None,
            name: name.to_string(),
            input_mapping,
            output_variable: Some(output_variable.to_string()),
            condition_expression: None,
            depends_on,
            approval_config: None,
            retry_config: None,
            timeout_seconds: 30,
        },
    )
    .await
    .expect("create approval step");
    step.id
}
