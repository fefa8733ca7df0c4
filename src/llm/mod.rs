//! LLM driver (spec §4.3): a provider-agnostic facade that sends a
//! `(system, messages, tools)` bundle and drives the tool-use loop until a
//! terminal text answer, capped at 10 tool-use turns.

pub mod anthropic;

use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::models::ToolCatalogEntry;

pub use anthropic::AnthropicProvider;

/// Maximum tool-use turns per agent execution (spec §4.3).
pub const MAX_TOOL_USE_TURNS: u32 = 10;

/// One block of message content, mirroring the messages-API wire shape
/// (spec §6.2): text, a model-issued tool call, or a tool result fed back
/// to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

/// A single message in the running conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// Why the model stopped generating (spec §6.2 `stop_reason`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// Token usage reported by the provider (spec §6.2 `usage`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One API turn: `(system, messages, tools, model, temperature, max_tokens)`.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolCatalogEntry>,
    pub temperature: f64,
    pub max_tokens: i32,
}

/// One API turn's response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// Provider-agnostic seam a second provider drops into (spec §9 Q5).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// The final outcome of a driven tool-use loop.
#[derive(Debug, Clone)]
pub struct DriverOutcome {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// A tool-dispatch callback: `(name, input) -> result string`. Boxed so the
/// driver stays agnostic to whatever resolves a tool call (spec §4.4).
pub type DispatchFn<'a> =
    dyn Fn(String, Value) -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync + 'a;

/// Drive the tool-use loop for one agent invocation (spec §4.3).
///
/// Messages start as `[{user, initial_user_content}]`. While the response's
/// stop reason is `tool_use`, every tool-use block is dispatched
/// (concurrently; spec: "dispatches may execute concurrently"), the
/// model's message is appended verbatim, a single user message carrying all
/// tool results (in the model's requested order) is appended, and the
/// provider is re-invoked. Exceeding `MAX_TOOL_USE_TURNS` turns fails with
/// `Error::MaxIterations`.
pub async fn invoke(
    provider: &dyn LlmProvider,
    model: &str,
    system: &str,
    temperature: f64,
    max_tokens: i32,
    initial_user_content: &str,
    tools: Vec<ToolCatalogEntry>,
    dispatch: &DispatchFn<'_>,
) -> Result<DriverOutcome> {
    let mut messages = vec![Message::user_text(initial_user_content)];
    let mut usage = TokenUsage::default();

    for turn in 0..MAX_TOOL_USE_TURNS {
        let request = LlmRequest {
            model: model.to_string(),
            system: system.to_string(),
            messages: messages.clone(),
            tools: tools.clone(),
            temperature,
            max_tokens,
        };

        let response = provider.send(&request).await?;
        usage.add(response.usage);

        if response.stop_reason != StopReason::ToolUse {
            let text = concat_text(&response.content);
            return Ok(DriverOutcome {
                text,
                stop_reason: response.stop_reason,
                usage,
            });
        }

        tracing::info!(turn, "agent requested tool use");

        let tool_uses: Vec<(String, String, Value)> = response
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect();

        messages.push(Message {
            role: Role::Assistant,
            content: response.content.clone(),
        });

        let results = join_all(
            tool_uses
                .into_iter()
                .map(|(id, name, input)| async move { (id, dispatch(name, input).await) }),
        )
        .await;

        let tool_result_content = results
            .into_iter()
            .map(|(tool_use_id, content)| ContentBlock::ToolResult {
                tool_use_id,
                content,
            })
            .collect();

        messages.push(Message {
            role: Role::User,
            content: tool_result_content,
        });
    }

    Err(Error::MaxIterations)
}

fn concat_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<LlmResponse>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn send(&self, _request: &LlmRequest) -> Result<LlmResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("provider exhausted");
            }
            Ok(responses.remove(0))
        }
    }

    #[tokio::test]
    async fn terminal_response_returns_immediately() {
        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(vec![LlmResponse {
                content: vec![ContentBlock::Text {
                    text: "hello".to_string(),
                }],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            }]),
        };

        let dispatch: Box<DispatchFn> =
            Box::new(|_name, _input| Box::pin(async move { "unused".to_string() }));

        let outcome = invoke(
            &provider,
            "model",
            "system",
            0.5,
            100,
            "hi",
            vec![],
            &*dispatch,
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "hello");
        assert_eq!(outcome.usage.total(), 15);
    }

    #[tokio::test]
    async fn tool_use_loop_dispatches_and_continues() {
        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(vec![
                LlmResponse {
                    content: vec![ContentBlock::ToolUse {
                        id: "t1".to_string(),
                        name: "lookup".to_string(),
                        input: Value::Null,
                    }],
                    stop_reason: StopReason::ToolUse,
                    usage: TokenUsage::default(),
                },
                LlmResponse {
                    content: vec![ContentBlock::Text {
                        text: "done".to_string(),
                    }],
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage::default(),
                },
            ]),
        };

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let dispatch: Box<DispatchFn> = Box::new(move |name, _input| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let name = name.clone();
            Box::pin(async move { format!("result for {name}") })
        });

        let outcome = invoke(
            &provider,
            "model",
            "system",
            0.5,
            100,
            "hi",
            vec![],
            &*dispatch,
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exceeding_max_turns_fails_with_max_iterations() {
        let responses = (0..MAX_TOOL_USE_TURNS + 1)
            .map(|_| LlmResponse {
                content: vec![ContentBlock::ToolUse {
                    id: "t".to_string(),
                    name: "loop".to_string(),
                    input: Value::Null,
                }],
                stop_reason: StopReason::ToolUse,
                usage: TokenUsage::default(),
            })
            .collect();

        let provider = ScriptedProvider {
            responses: std::sync::Mutex::new(responses),
        };

        let dispatch: Box<DispatchFn> =
            Box::new(|_name, _input| Box::pin(async move { "x".to_string() }));

        let result = invoke(
            &provider,
            "model",
            "system",
            0.5,
            100,
            "hi",
            vec![],
            &*dispatch,
        )
        .await;

        assert!(matches!(result, Err(Error::MaxIterations)));
    }
}
