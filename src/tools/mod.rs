//! Tool dispatcher (spec §4.4): `dispatch(name, input) -> resultString`.
//!
//! Resolution order:
//! 1. `name == "mcp_call"` delegates to an external tool-server client,
//!    carrying the inner `tool_name`/`arguments` fields (spec §6.3).
//! 2. Otherwise the dispatcher looks up the `Tool` row by name to find its
//!    `handler` reference, then consults an in-process registry keyed by
//!    that reference. An unregistered handler returns a well-formed stub
//!    so the tool-use loop stays testable end to end.
//!
//! Handler and tool-server errors are caught and returned as a
//! stringified error object rather than propagated, so the model can
//! observe the failure (spec §4.4 "Errors").

pub mod mcp;
pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::PgPool;

use crate::observability;

pub use mcp::{HttpMcpClient, McpClient};
pub use registry::ToolHandler;

/// Reserved tool name that routes through the external tool-server.
pub const MCP_CALL_TOOL_NAME: &str = "mcp_call";

pub struct ToolDispatcher {
    pool: PgPool,
    mcp_client: Option<Arc<dyn McpClient>>,
    registry: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    pub fn new(pool: PgPool, mcp_client: Option<Arc<dyn McpClient>>) -> Self {
        Self {
            pool,
            mcp_client,
            registry: HashMap::new(),
        }
    }

    /// Register an in-process handler under a handler reference (matches
    /// a `Tool::handler` value, spec §3 "handler reference").
    pub fn register(&mut self, handler_ref: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.registry.insert(handler_ref.into(), handler);
    }

    /// Resolve a tool call to a result string. Never returns `Err`: every
    /// failure path is folded into a stringified error payload so the
    /// agent runner's loop never aborts on a tool failure (spec §4.4).
    pub async fn dispatch(&self, name: &str, input: Value) -> String {
        if let Some(m) = observability::metrics() {
            m.record_tool_dispatch(name);
        }

        if name == MCP_CALL_TOOL_NAME {
            return self.dispatch_mcp(input).await;
        }

        let handler_ref = match crate::store::tools::get_by_name(&self.pool, name).await {
            Ok(tool) => tool.handler,
            Err(_) => name.to_string(),
        };

        match self.registry.get(&handler_ref) {
            Some(handler) => match handler.call(input.clone()).await {
                Ok(output) => output.to_string(),
                Err(message) => error_payload(&message),
            },
            None => stub_payload(name, &input),
        }
    }

    async fn dispatch_mcp(&self, input: Value) -> String {
        let tool_name = match input.get("tool_name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => return error_payload("mcp_call requires a string \"tool_name\" field"),
        };
        let arguments = input.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(client) = &self.mcp_client else {
            return error_payload("no tool-server client configured for mcp_call");
        };

        match client.call_tool(&tool_name, arguments).await {
            Ok(result) => result.to_string(),
            Err(e) => error_payload(&e.to_string()),
        }
    }
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn stub_payload(name: &str, input: &Value) -> String {
    json!({
        "message": format!("no handler registered for tool '{name}'"),
        "input": input,
    })
    .to_string()
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registered_handlers", &self.registry.keys().collect::<Vec<_>>())
            .field("mcp_configured", &self.mcp_client.is_some())
            .finish()
    }
}
