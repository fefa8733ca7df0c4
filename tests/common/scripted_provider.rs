//! A `LlmProvider` stub scripted per model name, so each agent in a
//! workflow under test can be given its own scripted sequence of
//! responses (including a scripted failure, for the retry scenario).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use conveyor::llm::{ContentBlock, LlmProvider, LlmRequest, LlmResponse, StopReason, TokenUsage};
use conveyor::{Error, Result};

pub enum Scripted {
    Fail,
    Text(&'static str),
}

pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<(&str, Vec<Scripted>)>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|(model, steps)| (model.to_string(), steps.into_iter().collect()))
            .collect();
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(&request.model)
            .unwrap_or_else(|| panic!("no script registered for model '{}'", request.model));
        let next = queue
            .pop_front()
            .unwrap_or_else(|| panic!("script exhausted for model '{}'", request.model));

        match next {
            Scripted::Fail => Err(Error::LlmFailure("stubbed provider failure".to_string())),
            Scripted::Text(text) => Ok(LlmResponse {
                content: vec![ContentBlock::Text {
                    text: text.to_string(),
                }],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            }),
        }
    }
}
