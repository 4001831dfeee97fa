//! Chat Completions wire shapes
//!
//! These schemas follow the OpenAI Chat Completions API closely enough to normalize requests
//! for the gateway's providers. Every inbound-facing struct keeps a flattened catch-all map so
//! fields we don't model are forwarded untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Request body for POST .../chat/completions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// The model identifier; absent on malformed or partial bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The conversation, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChatMessage>,

    /// Tools available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// How to choose which tool to use ("auto", "none", or a specific function)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Maximum tokens to generate (legacy name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,

    /// Maximum completion tokens (newer name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u64>,

    /// Parallel tool calls setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,

    /// Reasoning effort level ("low", "medium", "high", sometimes "none")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Extended thinking configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,

    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Additional fields not explicitly modeled
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    /// Parse a request body field by field.
    ///
    /// Only a body that isn't a JSON object yields `None`, which callers treat as an empty
    /// request. A field whose value doesn't fit its typed slot stays in `extra` and is forwarded
    /// as it came in.
    pub fn parse_lenient(body: &[u8]) -> Option<Self> {
        match serde_json::from_slice(body) {
            Ok(Value::Object(map)) => Some(Self::from_object(map)),
            Ok(_) => {
                debug!("Request body is not a JSON object");
                None
            }
            Err(e) => {
                debug!(error = %e, "Request body is not JSON");
                None
            }
        }
    }

    fn from_object(mut map: Map<String, Value>) -> Self {
        Self {
            model: take_field(&mut map, "model"),
            messages: take_objects(&mut map, "messages", ChatMessage::from_object)
                .unwrap_or_default(),
            tools: take_objects(&mut map, "tools", |tool| Some(Tool::from_object(tool))),
            tool_choice: take_field(&mut map, "tool_choice"),
            temperature: take_field(&mut map, "temperature"),
            top_p: take_field(&mut map, "top_p"),
            max_tokens: take_field(&mut map, "max_tokens"),
            max_completion_tokens: take_field(&mut map, "max_completion_tokens"),
            parallel_tool_calls: take_field(&mut map, "parallel_tool_calls"),
            reasoning_effort: take_field(&mut map, "reasoning_effort"),
            thinking: take_object(&mut map, "thinking").map(ThinkingConfig::from_object),
            stream: take_field(&mut map, "stream"),
            extra: map,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// Move `key` out of `map` as a `T`, leaving it in place when the value doesn't fit.
fn take_field<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let parsed = match T::deserialize(map.get(key)?) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(field = key, error = %e, "Keeping field untyped");
            return None;
        }
    };
    map.remove(key);
    Some(parsed)
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    match map.get(key) {
        Some(Value::Object(_)) => match map.remove(key) {
            Some(Value::Object(object)) => Some(object),
            _ => None,
        },
        _ => None,
    }
}

/// Move an array of objects out of `map`, or leave it untouched if any element doesn't parse.
fn take_objects<T>(
    map: &mut Map<String, Value>,
    key: &str,
    parse: impl Fn(Map<String, Value>) -> Option<T>,
) -> Option<Vec<T>> {
    let Some(Value::Array(items)) = map.get(key) else {
        return None;
    };
    let parsed = items
        .iter()
        .map(|item| match item {
            Value::Object(object) => parse(object.clone()),
            _ => None,
        })
        .collect::<Option<Vec<T>>>();

    if parsed.is_some() {
        map.remove(key);
    } else {
        debug!(field = key, "Keeping list untyped");
    }
    parsed
}

/// Extended thinking configuration (`{"type": "enabled", "budget_tokens": N}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u64>,

    /// Camel-case spelling some clients send instead of `budget_tokens`
    #[serde(
        rename = "budgetTokens",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub budget_tokens_camel: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThinkingConfig {
    fn from_object(mut map: Map<String, Value>) -> Self {
        Self {
            kind: take_field(&mut map, "type"),
            budget_tokens: take_field(&mut map, "budget_tokens"),
            budget_tokens_camel: take_field(&mut map, "budgetTokens"),
            extra: map,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.kind.as_deref() == Some("disabled")
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author
    pub role: String,

    /// The message content (string or array of content parts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (for tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// A message needs a string role; every other field falls back to `extra`.
    fn from_object(mut map: Map<String, Value>) -> Option<Self> {
        Some(Self {
            role: take_field(&mut map, "role")?,
            content: take_field::<Option<MessageContent>>(&mut map, "content").flatten(),
            tool_calls: take_field(&mut map, "tool_calls"),
            tool_call_id: take_field(&mut map, "tool_call_id"),
            extra: map,
        })
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }

    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Message content - a string, an array of content parts, or anything else a client sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

impl MessageContent {
    /// Concatenate the text of every part, separated by `separator`.
    ///
    /// Parts without text (images, tool results) contribute an empty string, and content of
    /// any other shape flattens to nothing.
    pub fn flatten(&self, separator: &str) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| p.text.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(separator),
            MessageContent::Other(_) => String::new(),
        }
    }
}

/// A typed content part (`text`, `image_url`, `tool_result`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Nested content of a `tool_result` part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Tool definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDefinition>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tool {
    fn from_object(mut map: Map<String, Value>) -> Self {
        Self {
            kind: take_field(&mut map, "type"),
            function: take_field(&mut map, "function"),
            extra: map,
        }
    }

    /// The function definition, if this is a `function` tool
    pub fn as_function(&self) -> Option<&FunctionDefinition> {
        match self.kind.as_deref() {
            Some("function") => self.function.as_ref(),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionDefinition> {
        match self.kind.as_deref() {
            Some("function") => self.function.as_mut(),
            _ => None,
        }
    }
}

/// Function definition for a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool call in an assistant message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Function call details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub arguments: String,
}

/// Response from POST .../chat/completions (non-streaming)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

/// The assistant message of a completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    pub cached_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    pub reasoning_tokens: u64,
}

/// Streaming chunk emitted to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// Format as an SSE record
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

/// A streaming choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

/// Tool call in a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkToolCall {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    pub function: ChunkFunctionCall,
}

/// Function call in a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFunctionCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
