//! External tool-server client (spec §6.3): an out-of-process component
//! hosting tool handlers, reached through a single `callTool` RPC.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[async_trait::async_trait]
pub trait McpClient: Send + Sync {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value>;
}

/// HTTP implementation: `POST {base_url}/call_tool` with
/// `{tool_name, arguments}`, returning the server's JSON response
/// verbatim. Scalars in `arguments` map to language-native scalars;
/// nested JSON is forwarded as-is (spec §4.4 point 1).
#[derive(Clone)]
pub struct HttpMcpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMcpClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[derive(Serialize)]
struct CallToolRequest<'a> {
    tool_name: &'a str,
    arguments: Value,
}

#[async_trait::async_trait]
impl McpClient for HttpMcpClient {
    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        let request = CallToolRequest {
            tool_name,
            arguments,
        };

        let response = self
            .client
            .post(format!("{}/call_tool", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ToolFailure(format!("tool-server request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ToolFailure(format!(
                "tool-server returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::ToolFailure(format!("malformed tool-server response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn forwards_tool_name_and_arguments_and_returns_response_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/call_tool"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 42})))
            .mount(&server)
            .await;

        let client = HttpMcpClient::new(server.uri());
        let result = client
            .call_tool("inventory_lookup", json!({"sku": "abc"}))
            .await
            .unwrap();

        assert_eq!(result, json!({"result": 42}));
    }

    #[tokio::test]
    async fn non_success_status_is_a_tool_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/call_tool"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpMcpClient::new(server.uri());
        let err = client.call_tool("x", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolFailure(_)));
    }
}
