//! Agent runner (spec §4.5): loads an agent record, assembles its tool
//! catalog, invokes the LLM driver with the tool dispatcher as the
//! dispatch callback, and writes an `AgentExecution` row around the call.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::llm::{self, LlmProvider};
use crate::observability;
use crate::store::models::ToolCatalogEntry;
use crate::store::{agent_executions, agents};
use crate::tools::ToolDispatcher;

/// Output of one agent invocation (spec §4.5 contract).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentOutput {
    pub text: String,
    pub stop_reason: String,
}

/// Result returned to the caller: the persisted output plus token split.
#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub output: Value,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub struct AgentRunner {
    pool: PgPool,
    provider: Arc<dyn LlmProvider>,
    dispatcher: Arc<ToolDispatcher>,
}

impl AgentRunner {
    pub fn new(pool: PgPool, provider: Arc<dyn LlmProvider>, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            pool,
            provider,
            dispatcher,
        }
    }

    /// Run one agent invocation end to end (spec §4.5 algorithm).
    ///
    /// `workflow_execution_id`/`workflow_step_id` are `None` for
    /// standalone agent invocations outside a workflow.
    pub async fn run(
        &self,
        agent_id: i64,
        input: Value,
        workflow_execution_id: Option<i64>,
        workflow_step_id: Option<i64>,
    ) -> Result<AgentRunResult> {
        let agent = agents::get(&self.pool, agent_id).await?;
        if !agent.active {
            return Err(Error::Inactive(format!("agent {} ({})", agent.id, agent.name)));
        }

        let execution =
            agent_executions::create(&self.pool, workflow_execution_id, workflow_step_id, agent_id, input.clone())
                .await?;

        if let Some(m) = observability::metrics() {
            m.record_agent_invocation_started(&agent.name);
        }

        tracing::info!(
            agent_execution_id = execution.id,
            agent_id,
            agent_name = %agent.name,
            "agent execution started"
        );

        let started = Instant::now();
        let catalog: Vec<ToolCatalogEntry> = agents::tool_catalog(&self.pool, agent_id).await?;
        let user_content = to_user_content(&input);

        let dispatcher = self.dispatcher.clone();
        let dispatch: Box<llm::DispatchFn> = Box::new(move |name, tool_input| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move { dispatcher.dispatch(&name, tool_input).await })
        });

        let outcome = llm::invoke(
            self.provider.as_ref(),
            &agent.model,
            &agent.system_prompt,
            agent.temperature,
            agent.max_tokens,
            &user_content,
            catalog,
            &*dispatch,
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        if let Some(m) = observability::metrics() {
            m.record_llm_round_trip(started.elapsed().as_secs_f64());
        }

        match outcome {
            Ok(driver_outcome) => {
                let output = serde_json::to_value(AgentOutput {
                    text: driver_outcome.text.clone(),
                    stop_reason: stop_reason_str(driver_outcome.stop_reason),
                })
                .map_err(Error::Serialization)?;

                agent_executions::complete(
                    &self.pool,
                    execution.id,
                    output.clone(),
                    driver_outcome.usage.total() as i32,
                    elapsed_ms,
                )
                .await?;

                if let Some(m) = observability::metrics() {
                    m.record_agent_invocation_succeeded(&agent.name);
                }

                tracing::info!(
                    agent_execution_id = execution.id,
                    elapsed_ms,
                    tokens = driver_outcome.usage.total(),
                    "agent execution completed"
                );

                Ok(AgentRunResult {
                    output,
                    input_tokens: driver_outcome.usage.input_tokens,
                    output_tokens: driver_outcome.usage.output_tokens,
                })
            }
            Err(e) => {
                agent_executions::fail(&self.pool, execution.id, &e.to_string(), elapsed_ms).await?;
                if let Some(m) = observability::metrics() {
                    m.record_agent_invocation_failed(&agent.name);
                }
                tracing::warn!(
                    agent_execution_id = execution.id,
                    error = %e,
                    "agent execution failed"
                );
                Err(e)
            }
        }
    }
}

/// The wire-style snake_case tag for a stop reason (spec §6.2), e.g.
/// `end_turn`, so a stubbed agent's recorded output matches what a real
/// provider response would have produced.
fn stop_reason_str(reason: llm::StopReason) -> String {
    serde_json::to_value(reason)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "end_turn".to_string())
}

/// Strings pass through; other JSON is stringified (spec §4.5 step 4).
fn to_user_content(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_pass_through_other_json_is_stringified() {
        assert_eq!(to_user_content(&Value::String("hi".to_string())), "hi");
        assert_eq!(to_user_content(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }
}
