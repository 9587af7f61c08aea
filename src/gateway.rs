//! The orchestration layer in front of our two AI providers.
//!
//! Both operations are stateless. [`Gateway::validate_edits`] settles trivial
//! cases locally before any provider call, and neither operation lets a raw
//! provider error reach the caller.

use std::{error, fmt, sync::Arc};

use schemars::JsonSchema;

use crate::{
    data_url::ImagePayload,
    prelude::*,
    providers::{ExtractionProvider, JudgmentProvider, ProviderOpts},
};

/// Reason given when the edited text is the same as the original.
pub const NO_CHANGES_REASON: &str =
    "No changes detected. The text is the same as the original.";

/// Reason given when the edited text is empty.
pub const EMPTY_TEXT_REASON: &str = "The text cannot be empty.";

/// Reason given when the judgment provider fails.
pub const VALIDATION_FAILED_REASON: &str =
    "An unexpected error occurred while validating the edits. Please try again.";

/// Message for every [`ExtractionError`].
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "An unexpected error occurred while extracting the text.";

/// A request to extract text from an image.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtractRequest {
    /// The image, as a `data:<mime-type>;base64,<data>` URL.
    pub photo_data_uri: String,
}

/// Text extracted from an image.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResult {
    /// The recognized text. May be empty if nothing was recognized.
    pub extracted_text: String,

    /// How confident the provider is in the text, from 0 to 100.
    pub confidence: f64,
}

impl ExtractResult {
    /// Create a new result, clamping `confidence` into `0..=100`.
    pub fn new(extracted_text: String, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            extracted_text,
            confidence,
        }
    }
}

/// A request to validate a user's edits.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidateRequest {
    /// The text as extracted.
    pub original_text: String,

    /// The text after the user's edits.
    pub edited_text: String,
}

/// A judgment on a user's edits.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResult {
    /// Are the edits a reasonable correction?
    pub is_valid: bool,

    /// A human-readable explanation. Always present.
    pub reason: String,
}

impl ValidateResult {
    /// Create a new judgment.
    pub fn new(is_valid: bool, reason: impl Into<String>) -> Self {
        Self {
            is_valid,
            reason: reason.into(),
        }
    }
}

/// Text extraction failed. The cause is logged, but never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionError;

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(EXTRACTION_FAILED_MESSAGE)
    }
}

impl error::Error for ExtractionError {}

/// Decide an edit locally, if we can.
///
/// Returns `None` when the provider needs to be asked.
pub fn judge_locally(original_text: &str, edited_text: &str) -> Option<ValidateResult> {
    let edited = edited_text.trim();
    if original_text.trim() == edited {
        Some(ValidateResult::new(true, NO_CHANGES_REASON))
    } else if edited.is_empty() {
        Some(ValidateResult::new(false, EMPTY_TEXT_REASON))
    } else {
        None
    }
}

/// Our two operations, backed by pluggable providers.
#[derive(Clone)]
pub struct Gateway {
    /// Recognizes text in images.
    extraction: Arc<dyn ExtractionProvider>,

    /// Judges edits.
    judgment: Arc<dyn JudgmentProvider>,
}

impl Gateway {
    /// Create a gateway from explicit providers.
    pub fn new(
        extraction: Arc<dyn ExtractionProvider>,
        judgment: Arc<dyn JudgmentProvider>,
    ) -> Self {
        Self {
            extraction,
            judgment,
        }
    }

    /// Create a gateway using the providers selected on the command line.
    pub async fn from_opts(opts: &ProviderOpts) -> Result<Self> {
        let (extraction, judgment) = opts.create_providers().await?;
        Ok(Self::new(extraction, judgment))
    }

    /// Extract text from an image given as a `data:` URL.
    #[instrument(level = "debug", skip_all, fields(len = photo_data_uri.len()))]
    pub async fn extract_text(
        &self,
        photo_data_uri: &str,
    ) -> Result<ExtractResult, ExtractionError> {
        match self.try_extract_text(photo_data_uri).await {
            Ok(result) => {
                debug!(
                    chars = result.extracted_text.chars().count(),
                    confidence = result.confidence,
                    "Extracted text"
                );
                Ok(result)
            }
            Err(err) => {
                error!("Error extracting text: {err:?}");
                Err(ExtractionError)
            }
        }
    }

    /// Extract text, with full error details.
    async fn try_extract_text(&self, photo_data_uri: &str) -> Result<ExtractResult> {
        let image = ImagePayload::from_data_url(photo_data_uri)
            .context("Invalid image payload")?;
        debug!(?image, "Decoded image");
        let result = self.extraction.extract(&image).await?;
        Ok(ExtractResult::new(result.extracted_text, result.confidence))
    }

    /// Judge whether `edited_text` is a reasonable correction of
    /// `original_text`. This never fails: provider errors become a negative
    /// judgment.
    #[instrument(level = "debug", skip_all)]
    pub async fn validate_edits(
        &self,
        original_text: &str,
        edited_text: &str,
    ) -> ValidateResult {
        if let Some(result) = judge_locally(original_text, edited_text) {
            debug!(is_valid = result.is_valid, "Judged edits locally");
            return result;
        }
        match self.judgment.judge(original_text, edited_text).await {
            Ok(result) => result,
            Err(err) => {
                error!("Error validating user edits: {err:?}");
                ValidateResult::new(false, VALIDATION_FAILED_REASON)
            }
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}
