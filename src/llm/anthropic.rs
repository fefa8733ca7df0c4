//! Messages-API style provider (spec §6.2): the one concrete
//! `LlmProvider` this crate ships. POSTs `/messages` with
//! `{model, max_tokens, temperature, system, messages, tools?}` and
//! normalizes the response's `content`/`stop_reason`/`usage` fields into
//! the driver's provider-agnostic types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::{ContentBlock, LlmProvider, LlmRequest, LlmResponse, Message, Role, StopReason, TokenUsage};

/// HTTP client for the messages-API provider.
#[derive(Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, api_version: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key,
            api_version,
        }
    }

    /// Override the base URL, for tests against a `wiremock` server.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: i32,
    temperature: f64,
    system: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<WireResponseBlock>,
    stop_reason: String,
    usage: WireUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

fn to_wire_message(m: &Message) -> WireMessage {
    WireMessage {
        role: match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: m
            .content
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => WireBlock::Text { text: text.clone() },
                ContentBlock::ToolUse { id, name, input } => WireBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                },
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                } => WireBlock::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                },
            })
            .collect(),
    }
}

fn from_stop_reason(raw: &str) -> StopReason {
    match raw {
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let wire = WireRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    Error::LlmFailure(format!("transport error (retryable): {e}"))
                } else {
                    Error::LlmFailure(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::LlmFailure(format!("authentication failed: {status}")));
        }
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmFailure(format!("invalid request ({status}): {body}")));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmFailure(format!(
                "upstream error (retryable, {status}): {body}"
            )));
        }

        let wire_response: WireResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmFailure(format!("malformed response: {e}")))?;

        let content = wire_response
            .content
            .into_iter()
            .map(|b| match b {
                WireResponseBlock::Text { text } => ContentBlock::Text { text },
                WireResponseBlock::ToolUse { id, name, input } => {
                    ContentBlock::ToolUse { id, name, input }
                }
            })
            .collect();

        Ok(LlmResponse {
            content,
            stop_reason: from_stop_reason(&wire_response.stop_reason),
            usage: TokenUsage {
                input_tokens: wire_response.usage.input_tokens,
                output_tokens: wire_response.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_expected_wire_shape_and_normalizes_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "hello"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 3, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new("key".to_string(), "2023-06-01".to_string()).with_base_url(server.uri());

        let request = LlmRequest {
            model: "claude-test".to_string(),
            system: "you are helpful".to_string(),
            messages: vec![Message::user_text("hi")],
            tools: vec![],
            temperature: 0.2,
            max_tokens: 100,
        };

        let response = provider.send(&request).await.unwrap();
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 5);
        assert_eq!(
            response.content,
            vec![ContentBlock::Text {
                text: "hello".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn server_error_surfaces_as_retryable_llm_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new("key".to_string(), "2023-06-01".to_string()).with_base_url(server.uri());

        let request = LlmRequest {
            model: "claude-test".to_string(),
            system: "sys".to_string(),
            messages: vec![Message::user_text("hi")],
            tools: vec![],
            temperature: 0.2,
            max_tokens: 100,
        };

        let err = provider.send(&request).await.unwrap_err();
        assert!(matches!(err, Error::LlmFailure(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unauthorized_is_not_retryable_in_spirit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new("bad-key".to_string(), "2023-06-01".to_string()).with_base_url(server.uri());

        let request = LlmRequest {
            model: "claude-test".to_string(),
            system: "sys".to_string(),
            messages: vec![Message::user_text("hi")],
            tools: vec![],
            temperature: 0.2,
            max_tokens: 100,
        };

        let err = provider.send(&request).await.unwrap_err();
        assert!(matches!(err, Error::LlmFailure(ref msg) if msg.contains("authentication")));
    }
}
