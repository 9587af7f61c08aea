//! LLM-based text extraction.

use std::sync::Arc;

use schemars::JsonSchema;
use serde_json::Map;

use crate::{
    chat::StructuredChat,
    data_url::ImagePayload,
    drivers::{Driver, LlmOpts},
    gateway::ExtractResult,
    prelude::*,
    prompt::ChatPrompt,
};

use super::ExtractionProvider;

/// The default extraction prompt, used if no prompt is provided.
pub const DEFAULT_EXTRACT_PROMPT: &str = include_str!("prompts/extract_text.toml");

/// Text recognized in an image.
#[derive(Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct TextExtraction {
    /// The complete text of the image, in reading order.
    extracted_text: String,

    /// Confidence in the transcription, from 0 (nothing readable) to 100
    /// (every character certain).
    confidence: f64,
}

/// An LLM-based extraction provider.
#[derive(Debug)]
pub struct LlmExtractionProvider {
    /// The chat we use to talk to the LLM.
    chat: StructuredChat<TextExtraction>,
}

impl LlmExtractionProvider {
    /// Create a new LLM-based extraction provider.
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
impl ExtractionProvider for LlmExtractionProvider {
    #[instrument(level = "debug", skip_all, fields(mime_type = %image.mime_type))]
    async fn extract(&self, image: &ImagePayload) -> Result<ExtractResult> {
        let mut template_bindings = Map::new();
        template_bindings.insert(
            "photo_data_uri".to_owned(),
            Value::String(image.to_data_url()),
        );
        let response = self
            .chat
            .ask(&template_bindings)
            .await
            .context("failed to extract text with LLM")?;
        Ok(ExtractResult::new(
            response.extracted_text,
            response.confidence,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_url::tests::png_data_url, drivers::canned::CannedDriver};

    fn provider(driver: Arc<CannedDriver>) -> LlmExtractionProvider {
        let prompt = ChatPrompt::from_toml_str(DEFAULT_EXTRACT_PROMPT).unwrap();
        LlmExtractionProvider::new(
            driver,
            "gpt-4o-mini".to_owned(),
            prompt,
            LlmOpts::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_image_and_parses_answer() {
        let driver = Arc::new(CannedDriver::replying(json!({
            "extracted_text": "This is a sample.",
            "confidence": 92.0,
        })));
        let image = ImagePayload::from_data_url(&png_data_url()).unwrap();
        let result = provider(driver.clone()).extract(&image).await.unwrap();
        assert_eq!(result, ExtractResult::new("This is a sample.".to_owned(), 92.0));

        let requests = driver.requests();
        assert_eq!(requests.len(), 1);
        let user = &requests[0][1];
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"][1]["type"], "image_url");
        assert_eq!(user["content"][1]["image_url"]["url"], png_data_url());
    }

    #[tokio::test]
    async fn answers_that_break_the_schema_are_errors() {
        let driver = Arc::new(CannedDriver::replying(json!({
            "text": "This is a sample.",
        })));
        let image = ImagePayload::from_data_url(&png_data_url()).unwrap();
        assert!(provider(driver).extract(&image).await.is_err());
    }
}
