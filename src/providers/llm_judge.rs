//! LLM-based edit validation.

use std::sync::Arc;

use schemars::JsonSchema;
use serde_json::Map;

use crate::{
    chat::StructuredChat,
    drivers::{Driver, LlmOpts},
    gateway::ValidateResult,
    prelude::*,
    prompt::ChatPrompt,
};

use super::JudgmentProvider;

/// The default validation prompt, used if no prompt is provided.
pub const DEFAULT_VALIDATE_PROMPT: &str = include_str!("prompts/validate_edits.toml");

/// A judgment on an edit to recognized text.
#[derive(Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct EditJudgment {
    /// True if the edited text is a reasonable correction of the original.
    is_valid: bool,

    /// A short explanation of the judgment, for the person who made the edit.
    validation_reason: String,
}

/// An LLM-based judgment provider.
#[derive(Debug)]
pub struct LlmJudgmentProvider {
    /// The chat we use to talk to the LLM.
    chat: StructuredChat<EditJudgment>,
}

impl LlmJudgmentProvider {
    /// Create a new LLM-based judgment provider.
    pub fn new(
        driver: Arc<dyn Driver>,
        model: String,
        prompt: ChatPrompt,
        llm_opts: LlmOpts,
    ) -> Result<Self> {
        let chat = StructuredChat::new(driver, model, prompt, llm_opts)?;
        Ok(Self { chat })
    }
}

#[async_trait]
impl JudgmentProvider for LlmJudgmentProvider {
    #[instrument(level = "debug", skip_all)]
    async fn judge(
        &self,
        original_text: &str,
        edited_text: &str,
    ) -> Result<ValidateResult> {
        let mut template_bindings = Map::new();
        template_bindings.insert(
            "original_text".to_owned(),
            Value::String(original_text.to_owned()),
        );
        template_bindings.insert(
            "edited_text".to_owned(),
            Value::String(edited_text.to_owned()),
        );
        let judgment = self
            .chat
            .ask(&template_bindings)
            .await
            .context("failed to validate edits with LLM")?;
        Ok(ValidateResult::new(
            judgment.is_valid,
            judgment.validation_reason,
        ))
    }
}
