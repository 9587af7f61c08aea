//! Our prompt data type.
//!
//! Prompts are written in TOML (or JSON), and every string in them is a
//! Handlebars template. Rendering produces an array of OpenAI-style chat
//! messages.

use handlebars::Handlebars;
use schemars::JsonSchema;
use serde_json::Map;

use crate::{
    io::{JsonObject, read_json_or_toml},
    prelude::*,
};

/// Render a prompt as a JSON value, filling in template values for any string
/// fields.
pub trait RenderTemplate {
    type Output;

    /// Render the template.
    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output>;
}

/// A chat completion prompt.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChatPrompt {
    /// The developer (aka "system") message, if any.
    #[serde(default)]
    pub developer: Option<String>,

    /// Messages.
    pub messages: Vec<Message>,
}

impl ChatPrompt {
    /// Parse a built-in TOML prompt.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("Failed to parse prompt")
    }

    /// Load a prompt from `path`, or fall back to the built-in prompt.
    pub async fn load_or_default(path: Option<&Path>, builtin: &str) -> Result<Self> {
        match path {
            Some(path) => read_json_or_toml(path).await,
            None => Self::from_toml_str(builtin),
        }
    }

    /// Render the prompt as an array of chat messages.
    pub fn render_prompt(&self, bindings: &JsonObject) -> Result<Value> {
        let mut handlebars = Handlebars::new();
        // We're not generating HTML, and escaping would mangle `data:` URLs.
        handlebars.register_escape_fn(handlebars::no_escape);
        // Complain loudly about typos in custom prompts.
        handlebars.set_strict_mode(true);
        self.render_template(&handlebars, bindings)
    }
}

impl RenderTemplate for ChatPrompt {
    type Output = Value;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        let mut messages = Vec::new();
        if let Some(developer) = &self.developer {
            messages.push(json!({
                "role": "system",
                "content": handlebars.render_template(developer, bindings)?,
            }));
        }
        for message in &self.messages {
            messages.extend(message.render_template(handlebars, bindings)?);
        }
        Ok(Value::Array(messages))
    }
}

/// A message, optional images, and optionally a response (represented as a
/// JSON object).
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// The user message.
    pub user: String,

    /// Image URLs to attach to the user message. Usually a template like
    /// `"{{photo_data_uri}}"`.
    #[serde(default)]
    pub images: Vec<String>,

    /// The assistant response (optional). This is always a JSON object.
    #[serde(default)]
    pub assistant: Option<JsonObject>,
}

impl RenderTemplate for Message {
    type Output = Vec<Value>;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        let user = handlebars.render_template(&self.user, bindings)?;
        let content = if self.images.is_empty() {
            Value::String(user)
        } else {
            let mut parts = vec![json!({ "type": "text", "text": user })];
            for image in &self.images {
                let url = handlebars.render_template(image, bindings)?;
                parts.push(json!({ "type": "image_url", "image_url": { "url": url } }));
            }
            Value::Array(parts)
        };
        let mut messages = vec![json!({ "role": "user", "content": content })];
        if let Some(assistant) = &self.assistant {
            let assistant = assistant.render_template(handlebars, bindings)?;
            messages
                .push(json!({ "role": "assistant", "content": assistant.to_string() }));
        }
        Ok(messages)
    }
}

impl RenderTemplate for Value {
    type Output = Value;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        match self {
            Value::String(s) => {
                let rendered = handlebars.render_template(s, bindings)?;
                Ok(Value::String(rendered))
            }
            Value::Object(obj) => obj.render_template(handlebars, bindings),
            Value::Array(arr) => {
                let mut output = Vec::new();
                for value in arr {
                    output.push(value.render_template(handlebars, bindings)?);
                }
                Ok(Value::Array(output))
            }
            _ => Ok(self.clone()),
        }
    }
}

impl RenderTemplate for JsonObject {
    type Output = Value;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        let mut output = Map::new();
        for (key, value) in self {
            let rendered_key = handlebars.render_template(key, bindings)?;
            let rendered_value = value.render_template(handlebars, bindings)?;
            output.insert(rendered_key, rendered_value);
        }
        Ok(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> JsonObject {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
            .collect()
    }

    #[test]
    fn renders_text_and_image_parts_without_escaping() {
        let prompt = ChatPrompt::from_toml_str(
            r#"
developer = "You read documents."

[[messages]]
user = "Read this <page>."
images = ["{{photo_data_uri}}"]
"#,
        )
        .unwrap();
        let url = "data:image/png;base64,iVBORw0KGgo+/=";
        let rendered = prompt
            .render_prompt(&bindings(&[("photo_data_uri", url)]))
            .unwrap();
        assert_eq!(
            rendered,
            json!([
                { "role": "system", "content": "You read documents." },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "Read this <page>." },
                        { "type": "image_url", "image_url": { "url": url } },
                    ],
                },
            ])
        );
    }

    #[test]
    fn renders_few_shot_assistant_messages_as_json_strings() {
        let prompt = ChatPrompt::from_toml_str(
            r#"
[[messages]]
user = "Original: {{original_text}}"

[messages.assistant]
is_valid = true
validation_reason = "Fixed \"{{original_text}}\"."
"#,
        )
        .unwrap();
        let rendered = prompt
            .render_prompt(&bindings(&[("original_text", "Teh")]))
            .unwrap();
        assert_eq!(rendered[0]["content"], "Original: Teh");
        let assistant: Value =
            serde_json::from_str(rendered[1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(
            assistant,
            json!({ "is_valid": true, "validation_reason": "Fixed \"Teh\"." })
        );
    }

    #[test]
    fn missing_bindings_are_errors() {
        let prompt = ChatPrompt::from_toml_str(
            r#"
[[messages]]
user = "{{edited_txet}}"
"#,
        )
        .unwrap();
        assert!(prompt.render_prompt(&JsonObject::new()).is_err());
    }

    #[test]
    fn unknown_prompt_fields_are_rejected() {
        let err = ChatPrompt::from_toml_str("system = \"typo\"\nmessages = []\n");
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn custom_prompts_load_from_json_or_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("prompt.json");
        let toml_path = dir.path().join("prompt.toml");
        std::fs::write(
            &json_path,
            r#"{"messages": [{"user": "JSON: {{edited_text}}"}]}"#,
        )
        .unwrap();
        std::fs::write(&toml_path, "[[messages]]\nuser = \"TOML: {{edited_text}}\"\n")
            .unwrap();

        let bindings = bindings(&[("edited_text", "The cat sat.")]);
        for (path, expected) in [
            (&json_path, "JSON: The cat sat."),
            (&toml_path, "TOML: The cat sat."),
        ] {
            let prompt = ChatPrompt::load_or_default(Some(path.as_path()), "messages = []")
                .await
                .unwrap();
            let rendered = prompt.render_prompt(&bindings).unwrap();
            assert_eq!(rendered, json!([{ "role": "user", "content": expected }]));
        }
    }

    #[tokio::test]
    async fn missing_custom_prompt_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(
            ChatPrompt::load_or_default(Some(missing.as_path()), "messages = []")
                .await
                .is_err()
        );
        let builtin = ChatPrompt::load_or_default(None, "messages = []")
            .await
            .unwrap();
        assert!(builtin.messages.is_empty());
    }
}
