//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;

use crate::{
    gateway::{ExtractRequest, ExtractResult, ValidateRequest, ValidateResult},
    io::write_json,
    prelude::*,
    prompt::ChatPrompt,
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// Body of `POST /api/extract`.
    ExtractRequest,
    /// Successful response from `POST /api/extract`.
    ExtractResult,
    /// Body of `POST /api/validate`.
    ValidateRequest,
    /// Response from `POST /api/validate`.
    ValidateResult,
    /// A custom prompt file.
    ChatPrompt,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::ExtractRequest => schema_for!(ExtractRequest),
        SchemaType::ExtractResult => schema_for!(ExtractResult),
        SchemaType::ValidateRequest => schema_for!(ValidateRequest),
        SchemaType::ValidateResult => schema_for!(ValidateResult),
        SchemaType::ChatPrompt => schema_for!(ChatPrompt),
    };
    write_json(schema_opts.output_path.as_deref(), &schema).await
}
