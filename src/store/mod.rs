//! Durable persistence for agents, tools, workflows, steps, executions,
//! agent-executions, approval requests, and schedules (spec §3).
//!
//! Each entity gets its own repository submodule of free functions over
//! `&PgPool`; `Store` is a thin handle the rest of the engine shares, plus
//! the one cross-entity convenience (`tool_catalog` lives on `agents`
//! since it joins through `agent_tools`).

pub mod agent_executions;
pub mod agent_tools;
pub mod agents;
pub mod approval_requests;
pub mod models;
pub mod tools;
pub mod workflow_executions;
pub mod workflow_schedules;
pub mod workflow_steps;
pub mod workflows;

use sqlx::PgPool;

use crate::database::HealthStatus;

/// Shared handle to the connection pool, passed by reference to repository
/// functions. Exists as a distinct type from `database::Database` so
/// callers that only need query access don't carry migration/lifecycle
/// methods.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check used by liveness probes, following
    /// `database::Database::health_check` verbatim in shape.
    pub async fn health_check(&self) -> HealthStatus {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => HealthStatus {
                is_healthy: true,
                message: "connected".to_string(),
            },
            Err(e) => HealthStatus {
                is_healthy: false,
                message: format!("connection failed: {e}"),
            },
        }
    }
}
