//! Text extraction using AWS Textract.

use aws_config::BehaviorVersion;
use aws_sdk_textract::{
    primitives::Blob,
    types::{Block, BlockType, Document},
};

use crate::{
    data_url::ImagePayload,
    drivers::{LlmError, LlmOpts},
    gateway::ExtractResult,
    prelude::*,
};

use super::ExtractionProvider;

/// Image formats Textract's synchronous API accepts.
const TEXTRACT_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/tiff"];

/// Extraction provider wrapping the AWS Textract API.
#[derive(Debug)]
pub struct TextractExtractionProvider {
    /// AWS Textract client.
    client: aws_sdk_textract::Client,

    /// Used for the request timeout.
    llm_opts: LlmOpts,
}

impl TextractExtractionProvider {
    /// Create a new Textract provider, using the standard AWS configuration
    /// conventions (environment variables, credential files, etc).
    pub async fn new(llm_opts: LlmOpts) -> Result<Self> {
        let config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
        let client = aws_sdk_textract::Client::new(&config);
        Ok(Self { client, llm_opts })
    }
}

#[async_trait]
impl ExtractionProvider for TextractExtractionProvider {
    #[instrument(level = "debug", skip_all, fields(mime_type = %image.mime_type))]
    async fn extract(&self, image: &ImagePayload) -> Result<ExtractResult> {
        check_image_type(image)?;

        let document = Document::builder()
            .bytes(Blob::new(image.data.clone()))
            .build();
        let request = self
            .client
            .detect_document_text()
            .document(document)
            .send();
        let output = match self.llm_opts.apply_timeout(request).await {
            Ok(output) => output,
            Err(LlmError::Native(err)) => {
                return Err(anyhow!("AWS Textract error: {err:?}"));
            }
            Err(LlmError::Timeout) => {
                return Err(anyhow!("AWS Textract request timed out"));
            }
        };
        trace!("Document response: {output:#?}");
        Ok(lines_to_result(output.blocks()))
    }
}

/// Make sure Textract will accept `image` before we send it.
fn check_image_type(image: &ImagePayload) -> Result<()> {
    if TEXTRACT_IMAGE_TYPES.contains(&image.mime_type.as_str()) {
        Ok(())
    } else {
        Err(anyhow!(
            "AWS Textract does not accept {:?} images",
            image.mime_type
        ))
    }
}

/// Join Textract's LINE blocks into text, and average their confidence.
fn lines_to_result(blocks: &[Block]) -> ExtractResult {
    let lines = blocks
        .iter()
        .filter(|block| block.block_type() == Some(&BlockType::Line))
        .collect::<Vec<_>>();
    let text = lines
        .iter()
        .filter_map(|block| block.text())
        .collect::<Vec<_>>()
        .join("\n");
    let confidences = lines
        .iter()
        .filter_map(|block| block.confidence())
        .map(f64::from)
        .collect::<Vec<_>>();
    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };
    ExtractResult::new(text, confidence)
}
