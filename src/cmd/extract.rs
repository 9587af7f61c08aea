//! The `extract` subcommand.

use clap::Args;

use crate::{
    data_url::data_url,
    gateway::Gateway,
    io::{read_bytes, write_json, write_output},
    prelude::*,
    providers::ProviderOpts,
    ui::{ProgressConfig, Ui},
};

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// The image to extract text from (PNG, JPEG, GIF, WebP, BMP or TIFF).
    pub image_path: PathBuf,

    /// Write the output here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Print the full result, including confidence, as JSON.
    #[clap(long)]
    pub json: bool,

    #[clap(flatten)]
    pub provider_opts: ProviderOpts,
}

/// Guess the MIME type for an image, from its name or, failing that, its
/// contents. Whatever we guess, the gateway checks the bytes again.
fn guess_mime_type(path: &Path, data: &[u8]) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_owned())
        .or_else(|| infer::get(data).map(|kind| kind.mime_type().to_owned()))
        .unwrap_or_else(|| "application/octet-stream".to_owned())
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all, fields(image = %opts.image_path.display()))]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    let data = read_bytes(&opts.image_path).await?;
    let photo_data_uri = data_url(&guess_mime_type(&opts.image_path, &data), &data);
    drop(data);

    let gateway = Gateway::from_opts(&opts.provider_opts).await?;

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "📄",
        msg: "Extracting text",
        done_msg: "Extracted text",
    });
    let result = gateway.extract_text(&photo_data_uri).await;
    spinner.finish_and_clear();
    let result = result?;

    if result.extracted_text.trim().is_empty() {
        warn!("No text was recognized in {}", opts.image_path.display());
    }
    if opts.json {
        write_json(opts.output_path.as_deref(), &result).await
    } else {
        info!(confidence = result.confidence, "Extraction confidence");
        write_output(opts.output_path.as_deref(), &result.extracted_text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_url::tests::TINY_PNG;

    #[test]
    fn mime_type_comes_from_name_then_contents() {
        assert_eq!(guess_mime_type(Path::new("scan.jpg"), b""), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("scan"), TINY_PNG), "image/png");
        // Not an image extension, so sniff instead.
        assert_eq!(guess_mime_type(Path::new("scan.txt"), TINY_PNG), "image/png");
        assert_eq!(
            guess_mime_type(Path::new("notes"), b"hello"),
            "application/octet-stream"
        );
    }
}
