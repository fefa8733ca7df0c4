//! In-process tool handler registry (spec §4.4 resolution step 2).

use serde_json::Value;

/// An in-process side-effect the model can invoke, keyed in the
/// dispatcher's registry by the owning `Tool`'s `handler` reference.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: Value) -> std::result::Result<Value, String>;
}
