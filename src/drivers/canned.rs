//! Canned driver for testing.
//!
//! This driver returns a fixed JSON response (or a fixed failure) and records
//! the messages it was sent, so tests can check what the LLM would have seen.

use std::sync::Mutex;

use crate::prelude::*;

use super::{ChatCompletionResponse, Driver, LlmOpts, TokenUsage};

/// Canned driver for testing.
#[derive(Debug)]
pub struct CannedDriver {
    /// What to return. `Err` holds an error message.
    reply: Result<Value, String>,

    /// Every `messages` array we've been sent.
    requests: Mutex<Vec<Value>>,
}

impl CannedDriver {
    /// Always reply with `response`.
    pub fn replying(response: Value) -> Self {
        Self {
            reply: Ok(response),
            requests: Mutex::new(vec![]),
        }
    }

    /// Always fail with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_owned()),
            requests: Mutex::new(vec![]),
        }
    }

    /// The messages sent with each request so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Driver for CannedDriver {
    async fn chat_completion(
        &self,
        _model: &str,
        messages: Value,
        _schema: &Value,
        _llm_opts: &LlmOpts,
    ) -> Result<ChatCompletionResponse> {
        self.requests.lock().expect("lock poisoned").push(messages);
        match &self.reply {
            Ok(response) => Ok(ChatCompletionResponse {
                response: response.clone(),
                token_usage: Some(TokenUsage::default()),
            }),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}
