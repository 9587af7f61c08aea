//! The `validate` subcommand.

use clap::Args;

use crate::{
    gateway::Gateway,
    io::{read_text, write_json, write_output},
    prelude::*,
    providers::ProviderOpts,
    ui::{ProgressConfig, Ui},
};

/// The name the original web app gave its download.
pub const DEFAULT_EXPORT_NAME: &str = "qsnap-export.txt";

/// Validate command line arguments.
#[derive(Debug, Args)]
pub struct ValidateOpts {
    /// A file containing the text as extracted.
    pub original_path: PathBuf,

    /// A file containing the text after editing.
    pub edited_path: PathBuf,

    /// Also export the edited text as plain text, using `--export=PATH`. Pass
    /// the flag without a value to use `qsnap-export.txt`.
    #[clap(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = DEFAULT_EXPORT_NAME,
    )]
    pub export: Option<PathBuf>,

    /// Write the judgment here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub provider_opts: ProviderOpts,
}

/// The `validate` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_validate(ui: Ui, opts: &ValidateOpts) -> Result<()> {
    let original_text = read_text(&opts.original_path).await?;
    let edited_text = read_text(&opts.edited_path).await?;

    let gateway = Gateway::from_opts(&opts.provider_opts).await?;

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "🔎",
        msg: "Validating edits",
        done_msg: "Validated edits",
    });
    let result = gateway.validate_edits(&original_text, &edited_text).await;
    spinner.finish_and_clear();

    write_json(opts.output_path.as_deref(), &result).await?;

    // Like the original download button, exporting doesn't depend on the
    // judgment.
    if let Some(export_path) = &opts.export {
        write_output(Some(export_path), &edited_text).await?;
        info!("Exported edited text to {}", export_path.display());
    }
    Ok(())
}
