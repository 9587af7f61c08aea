//! Structured chat requests: render a prompt, call a driver, and validate the
//! JSON that comes back.

use std::{marker::PhantomData, sync::Arc};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::{
    drivers::{Driver, LlmOpts},
    io::JsonObject,
    prelude::*,
    prompt::ChatPrompt,
    schema::ResponseSchema,
};

/// A prompt bound to a model, whose answers must deserialize as `T`.
///
/// There's no retry here. A single failed attempt is reported to the caller.
pub struct StructuredChat<T> {
    /// The driver that talks to the LLM.
    driver: Arc<dyn Driver>,

    /// The model to use.
    model: String,

    /// The prompt to use.
    prompt: ChatPrompt,

    /// The schema answers must match.
    schema: ResponseSchema,

    /// The LLM options to use.
    llm_opts: LlmOpts,

    _response: PhantomData<fn() -> T>,
}

impl<T> StructuredChat<T>
where
    T: DeserializeOwned + JsonSchema,
{
    /// Create a new structured chat.
    pub fn new(
        driver: Arc<dyn Driver>,
        model: String,
        prompt: ChatPrompt,
        llm_opts: LlmOpts,
    ) -> Result<Self> {
        Ok(Self {
            driver,
            model,
            prompt,
            schema: ResponseSchema::for_type::<T>()?,
            llm_opts,
            _response: PhantomData,
        })
    }

    /// Ask the LLM, filling in the prompt with `bindings`.
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    pub async fn ask(&self, bindings: &JsonObject) -> Result<T> {
        let messages = self
            .prompt
            .render_prompt(bindings)
            .context("Error rendering prompt")?;
        let completion = self
            .driver
            .chat_completion(&self.model, messages, &self.schema.schema, &self.llm_opts)
            .await?;
        if let Some(usage) = completion.token_usage.as_ref().filter(|u| !u.is_zero()) {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }
        // Schema validation failure means the model (or a dodgy gateway
        // implementation of `response_format`) didn't follow the schema.
        self.schema.parse(completion.response)
    }
}

impl<T> std::fmt::Debug for StructuredChat<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredChat")
            .field("driver", &self.driver)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
