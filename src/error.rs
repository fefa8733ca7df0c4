//! Error types for the orchestrator core.

use thiserror::Error;

/// Main error type for the orchestrator.
///
/// The tags mirror the error kinds the orchestrator's retry and
/// propagation policy distinguishes between (see `orchestrator::retry`).
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced agent/tool/workflow/execution/step/schedule absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Agent or workflow is inactive and refuses execution.
    #[error("inactive: {0}")]
    Inactive(String),

    /// Duplicate name, malformed cron, missing agent on an agent step, bad JSON template.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The agent's model provider has no driver implementation.
    #[error("provider unsupported: {0}")]
    ProviderUnsupported(String),

    /// Upstream LLM call failed.
    #[error("LLM failure: {0}")]
    LlmFailure(String),

    /// A tool-server call or in-process handler raised, and the failure
    /// escaped the tool dispatcher's catch-and-stringify boundary.
    #[error("tool failure: {0}")]
    ToolFailure(String),

    /// The LLM tool-use loop exceeded its iteration cap.
    #[error("max iterations exceeded")]
    MaxIterations,

    /// A single step exceeded its configured deadline.
    #[error("step timed out after {0:?}")]
    StepTimeout(std::time::Duration),

    /// A step retried to exhaustion.
    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    /// A parallel step's listed predecessors are not all complete.
    #[error("dependency unmet: {0}")]
    DependencyUnmet(String),

    /// An approval request was rejected by its approver.
    #[error("approval rejected: {0}")]
    ApprovalRejected(String),

    /// An approval request passed its timeout while still pending.
    #[error("approval timed out")]
    ApprovalTimeout,

    /// A mutation was attempted on a record whose state no longer permits it
    /// (e.g. approving an already-decided request).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Database-related errors not already covered by `Sql`.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQL errors, propagated from sqlx.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Reqwest HTTP client errors (LLM provider, tool-server).
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Catch-all for errors that don't fit another tag.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the orchestrator's step loop should consider this error for
    /// retry when the step carries a retry config (spec §7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LlmFailure(_) | Error::StepTimeout(_) | Error::ToolFailure(_)
        )
    }
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;
