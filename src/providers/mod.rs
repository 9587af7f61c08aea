//! External AI providers.
//!
//! An extraction provider turns an image into text. A judgment provider
//! decides whether an edit to that text is a reasonable correction. Both are
//! black boxes to the rest of the crate.

use std::sync::Arc;

use clap::{Args, ValueEnum};

use crate::{
    data_url::ImagePayload,
    drivers::{Driver, LlmOpts, openai::OpenAiDriver},
    gateway::{ExtractResult, ValidateResult},
    prelude::*,
    prompt::ChatPrompt,
};

pub mod llm_extract;
pub mod llm_judge;
pub mod textract;

/// Recognizes text in images.
#[async_trait]
pub trait ExtractionProvider: Send + Sync + 'static {
    /// Extract text from `image`.
    async fn extract(&self, image: &ImagePayload) -> Result<ExtractResult>;
}

/// Judges whether an edit is a reasonable correction.
#[async_trait]
pub trait JudgmentProvider: Send + Sync + 'static {
    /// Judge the change from `original_text` to `edited_text`.
    async fn judge(&self, original_text: &str, edited_text: &str)
    -> Result<ValidateResult>;
}

/// Which extraction provider to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum ExtractEngine {
    /// A vision-capable LLM on an OpenAI-compatible endpoint.
    #[default]
    Llm,

    /// AWS Textract.
    Textract,
}

/// Provider options shared by every subcommand.
#[derive(Args, Clone, Debug)]
pub struct ProviderOpts {
    /// The engine used to extract text from images.
    #[clap(long, value_enum, default_value_t = ExtractEngine::default())]
    pub engine: ExtractEngine,

    /// The model used to extract text, for `--engine llm`.
    #[clap(long, default_value = "gpt-4o-mini")]
    pub extract_model: String,

    /// The model used to validate edits.
    #[clap(long, default_value = "gpt-4o-mini")]
    pub validate_model: String,

    /// A custom extraction prompt (TOML or JSON). The image is available as
    /// `{{photo_data_uri}}`.
    #[clap(long, value_name = "PATH")]
    pub extract_prompt: Option<PathBuf>,

    /// A custom validation prompt (TOML or JSON). The texts are available as
    /// `{{original_text}}` and `{{edited_text}}`.
    #[clap(long, value_name = "PATH")]
    pub validate_prompt: Option<PathBuf>,

    #[clap(flatten)]
    pub llm_opts: LlmOpts,
}

impl ProviderOpts {
    /// Instantiate the providers we were asked for.
    pub async fn create_providers(
        &self,
    ) -> Result<(Arc<dyn ExtractionProvider>, Arc<dyn JudgmentProvider>)> {
        let driver: Arc<dyn Driver> = Arc::new(OpenAiDriver::new()?);

        let extraction: Arc<dyn ExtractionProvider> = match self.engine {
            ExtractEngine::Llm => {
                let prompt = ChatPrompt::load_or_default(
                    self.extract_prompt.as_deref(),
                    llm_extract::DEFAULT_EXTRACT_PROMPT,
                )
                .await
                .context("Failed to load extraction prompt")?;
                Arc::new(llm_extract::LlmExtractionProvider::new(
                    driver.clone(),
                    self.extract_model.clone(),
                    prompt,
                    self.llm_opts.clone(),
                )?)
            }
            ExtractEngine::Textract => Arc::new(
                textract::TextractExtractionProvider::new(self.llm_opts.clone()).await?,
            ),
        };

        let prompt = ChatPrompt::load_or_default(
            self.validate_prompt.as_deref(),
            llm_judge::DEFAULT_VALIDATE_PROMPT,
        )
        .await
        .context("Failed to load validation prompt")?;
        let judgment = Arc::new(llm_judge::LlmJudgmentProvider::new(
            driver,
            self.validate_model.clone(),
            prompt,
            self.llm_opts.clone(),
        )?);

        Ok((extraction, judgment))
    }
}
