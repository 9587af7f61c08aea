//! LLM drivers.
//!
//! We leave most model compatibility to OpenAI-compatible gateways like
//! LiteLLM and Ollama, so there's one real driver. The [`Driver`] trait exists
//! so that everything above it can be tested without a network.

use std::{error, fmt, pin::Pin, time::Duration};

use clap::Args;
use futures::{FutureExt as _, TryFutureExt as _};
use tokio::time;

use crate::prelude::*;

#[cfg(test)]
pub mod canned;
pub mod openai;

/// Our chat-related options.
#[derive(Args, Clone, Debug, Default)]
pub struct LlmOpts {
    /// An upper limit on the number of completion tokens to generate. This may
    /// help prevent runaway responses, but it may also cause incomplete
    /// results. For English, many models have around 4 bytes per token.
    #[clap(long)]
    pub max_completion_tokens: Option<u32>,

    /// The temperature to use for sampling, between 0.0 and 2.0. Higher values
    /// may the output more random, while lower values may make it more
    /// deterministic. Defaults to the model's default.
    #[clap(long)]
    pub temperature: Option<f32>,

    /// The top-p sampling value to use, between 0.0 and 1.0. This is an
    /// alternative to temperature sampling. Defaults to the model's default.
    #[clap(long)]
    pub top_p: Option<f32>,

    /// A timeout, in seconds, for a provider to return a complete response.
    /// By default, we wait as long as the provider takes.
    #[clap(long)]
    pub timeout: Option<u64>,
}

impl LlmOpts {
    /// Apply a timeout to a future.
    ///
    /// It's possible that `future` holds references to data that it doesn't
    /// own. So we declare `'fut` to represent the lifetime of any data held by
    /// `future`, and carefully preserve it.
    ///
    /// We box our output future because it may have different implementations,
    /// depending on which branch we took.
    pub fn apply_timeout<'fut, T, E>(
        &self,
        future: impl Future<Output = Result<T, E>> + Send + 'fut,
    ) -> Pin<Box<dyn Future<Output = Result<T, LlmError<E>>> + Send + 'fut>>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let future = future.map_err(LlmError::Native);
        if let Some(timeout) = self.timeout {
            time::timeout(Duration::from_secs(timeout), future)
                // We have a `Result<Result<T, LlmError<E>>, Elapsed>` here, and
                // we want to convert it to a `Result<T, LlmError<E>>`.
                .map(|result| match result {
                    Ok(inner) => inner,
                    Err(_) => Err(LlmError::Timeout),
                })
                .boxed()
        } else {
            future.boxed()
        }
    }
}

/// Interface trait for LLM drivers.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync + 'static {
    /// Run a "chat completion" request, asking for a JSON object matching
    /// `schema`. `messages` is an array of OpenAI-style chat messages.
    ///
    /// The response has been parsed as JSON but not validated against
    /// `schema`. That's the caller's job.
    async fn chat_completion(
        &self,
        model: &str,
        messages: Value,
        schema: &Value,
        llm_opts: &LlmOpts,
    ) -> Result<ChatCompletionResponse>;
}

/// A chat completion response.
#[derive(Debug)]
pub struct ChatCompletionResponse {
    /// Structured response from the LLM.
    pub response: Value,

    /// Token usage.
    pub token_usage: Option<TokenUsage>,
}

/// Token usage.
#[derive(Clone, Debug, Default)]
pub struct TokenUsage {
    /// How many tokens were used in the prompt?
    pub prompt_tokens: u64,

    /// How many tokens were used in the response?
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Was our token usage zero?
    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}

/// An error which occurred while calling an LLM.
///
/// Used internally by drivers to handle timeouts.
#[derive(Debug)]
pub enum LlmError<E> {
    /// A native error.
    Native(E),

    /// A timeout error.
    Timeout,
}

impl<E> fmt::Display for LlmError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Native(err) => write!(f, "LLM error: {err}"),
            LlmError::Timeout => write!(f, "LLM request timed out"),
        }
    }
}

impl<E> error::Error for LlmError<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LlmError::Native(err) => Some(err),
            LlmError::Timeout => None,
        }
    }
}
