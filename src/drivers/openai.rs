//! Our OpenAI driver, which we also use for LiteLLM, Ollama and other
//! compatible gateways.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateChatCompletionResponse, FinishReason},
};
use serde_json::Map;

use crate::{drivers::TokenUsage, llm_client::create_llm_client, prelude::*};

use super::{ChatCompletionResponse, Driver, LlmOpts};

/// Our OpenAI driver, which we also use for LiteLLM, Ollama and other
/// compatible gateways.
#[derive(Debug)]
pub struct OpenAiDriver {
    /// The OpenAI client.
    pub client: Client<OpenAIConfig>,
}

impl OpenAiDriver {
    /// Create a new OpenAI driver.
    pub fn new() -> Result<Self> {
        let client = create_llm_client()?;
        Ok(Self { client })
    }
}

/// Build a raw `/chat/completions` request body.
///
/// We build JSON directly instead of using [`async_openai`]'s request types,
/// because our prompts mix text and image content parts, and it's easier to
/// keep that in one JSON shape all the way through.
fn build_request(
    model: &str,
    messages: Value,
    schema: &Value,
    llm_opts: &LlmOpts,
) -> Value {
    let name = schema
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("ResponseFormat");
    let mut req = Map::new();
    req.insert("model".to_owned(), Value::String(model.to_owned()));
    req.insert("messages".to_owned(), messages);
    req.insert(
        "response_format".to_owned(),
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": name,
                "schema": schema,
                "strict": true,
            },
        }),
    );
    if let Some(max_completion_tokens) = llm_opts.max_completion_tokens {
        req.insert(
            "max_completion_tokens".to_owned(),
            json!(max_completion_tokens),
        );
    }
    if let Some(temperature) = llm_opts.temperature {
        req.insert("temperature".to_owned(), json!(temperature));
    }
    if let Some(top_p) = llm_opts.top_p {
        req.insert("top_p".to_owned(), json!(top_p));
    }
    Value::Object(req)
}

/// Pull the structured JSON content out of a chat completion response.
fn parse_response(chat_result: Value) -> Result<ChatCompletionResponse> {
    let response = serde_json::from_value::<CreateChatCompletionResponse>(chat_result)
        .context("Error parsing OpenAI response")?;

    // How many tokens did we use?
    let token_usage = response.usage.map(|usage| TokenUsage {
        prompt_tokens: u64::from(usage.prompt_tokens),
        completion_tokens: u64::from(usage.completion_tokens),
    });

    // Get the content from our response & parse as JSON.
    let choice = response
        .choices
        .first()
        .ok_or_else(|| anyhow!("No choices in OpenAI response"))?;
    if choice.finish_reason == Some(FinishReason::ContentFilter) {
        return Err(anyhow!(
            "Content filter triggered (may also be a RECITATION error for Gemini models)"
        ));
    }
    let content = choice.message.content.as_deref().unwrap_or_default();
    debug!(%content, "Response");
    let response = serde_json::from_str::<Value>(content).with_context(|| {
        format!("Error parsing OpenAI response content: {:?}", content)
    })?;
    Ok(ChatCompletionResponse {
        response,
        token_usage,
    })
}

#[async_trait]
impl Driver for OpenAiDriver {
    #[instrument(level = "debug", skip_all, fields(model = %model))]
    async fn chat_completion(
        &self,
        model: &str,
        messages: Value,
        schema: &Value,
        llm_opts: &LlmOpts,
    ) -> Result<ChatCompletionResponse> {
        let req = build_request(model, messages, schema, llm_opts);

        // Call OpenAI.
        let chat = self.client.chat();
        let chat_result: Value = llm_opts
            .apply_timeout(chat.create_byot::<Value, Value>(req))
            .await
            .context("Error calling chat completion endpoint")?;
        trace!(%chat_result, "OpenAI response");
        parse_response(chat_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_strict_schema_and_optional_settings() {
        let schema = json!({ "title": "Judgment", "type": "object" });
        let messages = json!([{ "role": "user", "content": "hi" }]);
        let opts = LlmOpts {
            temperature: Some(0.5),
            ..LlmOpts::default()
        };
        let req = build_request("gpt-4o-mini", messages.clone(), &schema, &opts);
        assert_eq!(req["model"], "gpt-4o-mini");
        assert_eq!(req["messages"], messages);
        assert_eq!(req["response_format"]["json_schema"]["name"], "Judgment");
        assert_eq!(req["response_format"]["json_schema"]["strict"], true);
        assert_eq!(req["temperature"], 0.5);
        assert!(req.get("top_p").is_none());
        assert!(req.get("max_completion_tokens").is_none());
    }

    fn completion(content: &str, finish_reason: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": finish_reason,
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 5,
                "total_tokens": 17,
            },
        })
    }

    #[test]
    fn parses_structured_content() {
        let parsed =
            parse_response(completion(r#"{"is_valid": true}"#, "stop")).unwrap();
        assert_eq!(parsed.response, json!({ "is_valid": true }));
        let usage = parsed.token_usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 5);
    }

    #[test]
    fn rejects_filtered_or_non_json_content() {
        let err = parse_response(completion("{}", "content_filter")).unwrap_err();
        assert!(err.to_string().contains("Content filter"));

        let err = parse_response(completion("Sure! Here you go.", "stop")).unwrap_err();
        assert!(err.to_string().contains("Error parsing OpenAI response content"));
    }
}
