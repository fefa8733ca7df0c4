//! Entity types persisted by the store (spec section 3 of the data model).
//!
//! Every identifier is a monotonic `BIGINT` primary key. Status and tag
//! enums are stored as `TEXT` columns and round-trip through `Display`/
//! `FromStr`, mirroring how `jobs::models` represents `JobType`/`JobStatus`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant)),+,
                    other => Err(format!("invalid {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

string_enum!(ToolType {
    InProcess => "in_process",
    External => "external",
});

string_enum!(TriggerType {
    Manual => "manual",
    Scheduled => "scheduled",
    Event => "event",
});

string_enum!(ExecutionMode {
    Sync => "sync",
    Async => "async",
});

string_enum!(StepType {
    Agent => "agent",
    Condition => "condition",
    Approval => "approval",
    Parallel => "parallel",
});

string_enum!(ExecutionStatus {
    Pending => "pending",
    Running => "running",
    Paused => "paused",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl ExecutionStatus {
    /// Terminal statuses never transition further (spec §3, §4.6).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

string_enum!(AgentExecutionStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

string_enum!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Timeout => "timeout",
});

/// A named, model-bound prompt-and-tool bundle invoked as one LLM interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub config: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating an agent; `id`/timestamps are store-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub config: serde_json::Value,
    pub active: bool,
}

/// A named, schema-described side-effect the model can invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub tool_type: ToolType,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub handler: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTool {
    pub name: String,
    pub tool_type: ToolType,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub handler: String,
    pub active: bool,
}

/// A catalog entry derived from an agent's linked, active tools (spec §4.5 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCatalogEntry {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// The (agent, tool) assignment, with an optional per-agent config override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTool {
    pub id: i64,
    pub agent_id: i64,
    pub tool_id: i64,
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An ordered graph of steps over a shared context document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    pub trigger_config: serde_json::Value,
    pub execution_mode: ExecutionMode,
    pub active: bool,
    pub input_schema: Option<serde_json::Value>,
    pub interface_type: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    pub trigger_config: serde_json::Value,
    pub execution_mode: ExecutionMode,
    pub active: bool,
    pub input_schema: Option<serde_json::Value>,
    pub interface_type: String,
    pub public: bool,
}

/// One node of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i32,
    pub step_type: StepType,
    pub agent_id: Option<i64>,
    pub name: String,
    pub input_mapping: Option<serde_json::Value>,
    pub output_variable: Option<String>,
    pub condition_expression: Option<String>,
    /// Step orders this step depends on. Doubles as the grouping key for
    /// `parallel` steps per SPEC_FULL.md §B.3.
    pub depends_on: Vec<i32>,
    pub approval_config: Option<serde_json::Value>,
    pub retry_config: Option<serde_json::Value>,
    pub timeout_seconds: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflowStep {
    pub workflow_id: i64,
    pub step_order: i32,
    pub step_type: StepType,
    pub agent_id: Option<i64>,
    pub name: String,
    pub input_mapping: Option<serde_json::Value>,
    pub output_variable: Option<String>,
    pub condition_expression: Option<String>,
    pub depends_on: Vec<i32>,
    pub approval_config: Option<serde_json::Value>,
    pub retry_config: Option<serde_json::Value>,
    pub timeout_seconds: i32,
}

/// One invocation of a workflow; durable, with a state machine (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: i64,
    pub workflow_id: i64,
    pub status: ExecutionStatus,
    pub trigger_data: serde_json::Value,
    pub context: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One LLM-agent invocation record (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub id: i64,
    pub workflow_execution_id: Option<i64>,
    pub workflow_step_id: Option<i64>,
    pub agent_id: i64,
    pub status: AgentExecutionStatus,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub tokens_used: Option<i32>,
    pub elapsed_ms: Option<i64>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A durable pause token awaiting a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: i64,
    pub workflow_execution_id: i64,
    pub workflow_step_id: i64,
    pub status: ApprovalStatus,
    pub required_role: Option<String>,
    pub approver: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub timeout_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A cron-triggered workflow invocation with stored trigger data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSchedule {
    pub id: i64,
    pub workflow_id: i64,
    pub cron_expression: String,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub trigger_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflowSchedule {
    pub workflow_id: i64,
    pub cron_expression: String,
    pub trigger_data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for s in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            let parsed: ExecutionStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
    }
}
