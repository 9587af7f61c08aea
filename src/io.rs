//! I/O utilities.
//!
//! Reading prompt files in either JSON or TOML, reading the text and image
//! files the CLI works on, and writing output to a file or standard output.

use serde_json::Map;
use tokio::{
    fs::{self, File},
    io::{AsyncWrite, AsyncWriteExt as _},
};

use crate::prelude::*;

/// A JSON object.
pub type JsonObject = Map<String, Value>;

/// Read a file as either JSON or TOML, depending on its extension.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let data = read_text(path).await?;
    let ext = path.extension().unwrap_or_default();
    if ext == "json" {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Read a UTF-8 text file.
pub async fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))
}

/// Read a binary file.
pub async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))
}

/// Create a writer for either a file or standard output.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write `text` to a file or standard output, making sure it ends with a
/// newline when going to a terminal.
pub async fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    let mut wtr = create_writer(path).await?;
    wtr.write_all(text.as_bytes())
        .await
        .context("Failed to write output")?;
    if path.is_none() && !text.ends_with('\n') {
        wtr.write_all(b"\n")
            .await
            .context("Failed to write output")?;
    }
    wtr.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Write a value as pretty-printed JSON to a file or standard output.
pub async fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    write_output(path, &json).await
}
