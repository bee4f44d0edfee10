use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: ReplyMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ReplyMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JsonSchemaFormat {
    pub name: &'static str,
    pub schema: Value,
    pub strict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    temperature: f32,
}

// -----------
// Conversions
// -----------

/// Creates a non-streaming request whose reply must follow `schema`.
#[inline]
pub fn create_request(
    config: &OpenAIConfig,
    system: String,
    user: String,
    name: &'static str,
    schema: Value,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![
            Message::System { content: system },
            Message::User { content: user },
        ],
        response_format: ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name,
                schema,
                strict: false,
            },
        },
        temperature: 0.0,
    }
}
