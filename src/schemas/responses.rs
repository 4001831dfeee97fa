//! Responses API wire shapes
//!
//! The Codex family speaks the Responses protocol instead of Chat Completions: one
//! `instructions` string, an ordered list of input items, and a streamed item/event model.
//! Only the subset this layer reads or writes is modeled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for POST .../responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub stream: bool,

    /// System prompt, built from every system/developer message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    pub input: Vec<InputItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
}

/// Reasoning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: String,
}

/// An item in the input list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputItem {
    #[serde(rename = "message")]
    Message { role: String, content: String },

    #[serde(rename = "function_call")]
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },

    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

/// Tool definition in the Responses shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesTool {
    /// Function tools are flattened: no nested `function` object
    Function(FunctionTool),
    /// Anything else is forwarded as the client sent it
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Response from POST .../responses (non-streaming), also embedded in `response.completed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub created_at: Option<u64>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub output: Vec<OutputItem>,

    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

impl ResponsesResponse {
    /// Whether any output item is a function call
    pub fn has_function_call(&self) -> bool {
        self.output
            .iter()
            .any(|item| matches!(item, OutputItem::FunctionCall { .. }))
    }
}

/// An output item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        content: Vec<OutputContent>,
    },

    #[serde(rename = "function_call")]
    FunctionCall {
        /// Item identifier, referenced by argument deltas
        #[serde(default)]
        id: Option<String>,
        /// Call identifier, referenced by `function_call_output` items
        #[serde(default)]
        call_id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        arguments: String,
    },

    /// Reasoning, web search and any other item type
    #[serde(other)]
    Other,
}

/// A content part of an output message (`output_text`, `refusal`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Token usage in the Responses shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    pub output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u64,
}

/// A record of the Responses event stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.completed")]
    Completed {
        #[serde(default)]
        response: Option<ResponsesResponse>,
    },

    #[serde(rename = "response.incomplete")]
    Incomplete {
        #[serde(default)]
        response: Option<ResponsesResponse>,
    },

    /// Lifecycle and done events we don't translate
    #[serde(other)]
    Other,
}
