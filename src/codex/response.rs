//! Responses response → Chat Completions response (non-streaming)

use super::{finish_reason, generate_completion_id, translate_usage, unix_now};
use crate::schemas::chat_completions::{
    ChatCompletionResponse, Choice, FunctionCall, ResponseMessage, ToolCall,
};
use crate::schemas::responses::{OutputItem, ResponsesResponse};

/// Convert a finished Responses response into a chat completion.
///
/// Message text from every output message is concatenated; each function call becomes one tool
/// call, keyed by its call id.
pub fn to_chat_response(
    response: ResponsesResponse,
    requested_model: Option<&str>,
) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in &response.output {
        match item {
            OutputItem::Message { content, .. } => {
                for part in content {
                    text.push_str(part.text.as_deref().unwrap_or(""));
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => tool_calls.push(ToolCall {
                id: call_id.clone(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: arguments.clone(),
                },
            }),
            OutputItem::Other => {}
        }
    }

    let truncated = response.status.as_deref() == Some("incomplete");
    let finish_reason = finish_reason(&response, truncated);

    let content = if text.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(text)
    };

    ChatCompletionResponse {
        id: response.id.clone().unwrap_or_else(generate_completion_id),
        object: "chat.completion".to_string(),
        created: response.created_at.unwrap_or_else(unix_now),
        model: response
            .model
            .clone()
            .or_else(|| requested_model.map(str::to_string)),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: response.usage.as_ref().map(translate_usage),
    }
}
