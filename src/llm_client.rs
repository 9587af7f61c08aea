//! Client for OpenAI-compatible APIs (OpenAI itself, LiteLLM or Ollama).

use async_openai::{Client, config::OpenAIConfig};

use crate::prelude::*;

/// Create an OpenAI-compatible client configured from the environment.
///
/// `OPENAI_API_KEY` and `OPENAI_API_BASE` may also come from a `.env` file,
/// which `main` loads before we get here.
pub fn create_llm_client() -> Result<Client<OpenAIConfig>> {
    let mut client_config = OpenAIConfig::new();
    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        client_config = client_config.with_api_key(api_key);
    } else {
        debug!("OPENAI_API_KEY is not set");
    }
    if let Ok(api_base) = std::env::var("OPENAI_API_BASE") {
        debug!(%api_base, "Using custom API base");
        client_config = client_config.with_api_base(api_base);
    }
    Ok(Client::with_config(client_config))
}
