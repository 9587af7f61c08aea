//! JSON Schema support for structured LLM responses.

use schemars::{JsonSchema, schema_for};

use crate::prelude::*;

/// Generate a JSON Schema for `T` that OpenAI's strict `response_format`
/// will accept.
///
/// `schemars` emits a few keywords that strict mode rejects (`$schema`, and
/// `format` annotations like `"double"` on numbers), so we strip those. The
/// types we use here are flat objects marked `deny_unknown_fields`, so
/// `additionalProperties` is already `false` and every field is required.
pub fn response_schema<T: JsonSchema>() -> Result<Value> {
    let schema = serde_json::to_value(schema_for!(T))
        .context("Failed to serialize response schema")?;
    let mut schema = strip_unsupported_keywords(schema);
    if let Value::Object(obj) = &mut schema {
        obj.remove("$schema");
    }
    Ok(schema)
}

/// Remove `format` keywords everywhere in a schema.
fn strip_unsupported_keywords(schema: Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(key, value)| !(key == "format" && value.is_string()))
                .map(|(key, value)| (key, strip_unsupported_keywords(value)))
                .collect(),
        ),
        Value::Array(arr) => {
            Value::Array(arr.into_iter().map(strip_unsupported_keywords).collect())
        }
        other => other,
    }
}

/// A schema paired with its compiled validator.
#[derive(Debug)]
pub struct ResponseSchema {
    /// Our JSON Schema.
    pub schema: Value,

    /// Our JSON Schema validator.
    validator: jsonschema::Validator,
}

impl ResponseSchema {
    /// Build the response schema for `T`.
    pub fn for_type<T: JsonSchema>() -> Result<Self> {
        let schema = response_schema::<T>()?;
        debug!(%schema, "Schema");
        let validator = jsonschema::validator_for(&schema)?;
        Ok(Self { schema, validator })
    }

    /// Validate a response, then deserialize it.
    pub fn parse<T: serde::de::DeserializeOwned>(&self, response: Value) -> Result<T> {
        self.validator
            .validate(&response)
            .map_err(|err| err.to_owned())
            .with_context(|| format!("Failed to validate {}:", response))?;
        serde_json::from_value(response).context("Failed to deserialize response")
    }
}
