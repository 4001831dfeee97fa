//! Chat Completions request → Responses request

use crate::normalize::chatgpt::REASONING_EFFORT_NONE;
use crate::schemas::chat_completions::{ChatCompletionRequest, ChatMessage, MessageContent, Tool};
use crate::schemas::responses::{
    FunctionTool, InputItem, ReasoningConfig, ResponsesRequest, ResponsesTool,
};
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// Convert a chat completion request into the Responses shape.
#[instrument(skip(request), fields(model = request.model.as_deref(), messages = request.messages.len()))]
pub fn to_responses_request(request: &ChatCompletionRequest) -> ResponsesRequest {
    let mut instructions: Vec<String> = Vec::new();
    let mut input = Vec::with_capacity(request.messages.len());

    for message in &request.messages {
        match message.role.as_str() {
            "system" | "developer" => {
                let text = flatten(message, "\n");
                if !text.is_empty() {
                    instructions.push(text);
                }
            }
            "user" => input.push(InputItem::Message {
                role: "user".to_string(),
                content: flatten(message, "\n"),
            }),
            "assistant" => assistant_items(message, &mut input),
            "tool" => input.push(InputItem::FunctionCallOutput {
                call_id: message.tool_call_id.clone().unwrap_or_default(),
                output: tool_output(message.content.as_ref()),
            }),
            role => debug!(role, "Skipping message with unsupported role"),
        }
    }

    let reasoning = request
        .reasoning_effort
        .as_deref()
        .filter(|effort| *effort != REASONING_EFFORT_NONE)
        .map(|effort| ReasoningConfig {
            effort: effort.to_string(),
        });

    ResponsesRequest {
        model: request.model.clone(),
        stream: request.is_streaming(),
        instructions: (!instructions.is_empty()).then(|| instructions.join("\n")),
        input,
        tools: request.tools.as_deref().map(convert_tools),
        tool_choice: request.tool_choice.clone(),
        max_output_tokens: request.max_completion_tokens.or(request.max_tokens),
        temperature: request.temperature,
        top_p: request.top_p,
        parallel_tool_calls: request.parallel_tool_calls,
        reasoning,
    }
}

fn flatten(message: &ChatMessage, separator: &str) -> String {
    message
        .content
        .as_ref()
        .map(|content| content.flatten(separator))
        .unwrap_or_default()
}

/// Tool calls first, in order, then any residual text as a trailing message.
fn assistant_items(message: &ChatMessage, input: &mut Vec<InputItem>) {
    for call in message.tool_calls.iter().flatten() {
        input.push(InputItem::FunctionCall {
            call_id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: call.function.arguments.clone(),
        });
    }

    let text = flatten(message, "");
    if !text.is_empty() {
        input.push(InputItem::Message {
            role: "assistant".to_string(),
            content: text,
        });
    }
}

/// Text output is sent as-is; parts or structured content go as their JSON encoding.
fn tool_output(content: Option<&MessageContent>) -> String {
    match content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(structured) => serde_json::to_string(structured).unwrap_or_default(),
        None => String::new(),
    }
}

fn convert_tools(tools: &[Tool]) -> Vec<ResponsesTool> {
    tools
        .iter()
        .filter_map(|tool| match tool.as_function() {
            Some(function) => Some(ResponsesTool::Function(FunctionTool {
                kind: "function".to_string(),
                name: function.name.clone(),
                description: function.description.clone().unwrap_or_default(),
                parameters: function.parameters.clone().unwrap_or_else(|| json!({})),
            })),
            None => serde_json::to_value(tool).ok().map(ResponsesTool::Other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(body: Value) -> Value {
        let request: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        serde_json::to_value(to_responses_request(&request)).unwrap()
    }

    #[test]
    fn test_system_and_developer_messages_become_instructions() {
        let converted = convert(json!({
            "model": "gpt-5-codex",
            "messages": [
                {"role": "system", "content": [
                    {"type": "text", "text": "Be terse."},
                    {"type": "text", "text": "Use Rust."}
                ]},
                {"role": "user", "content": "hi"},
                {"role": "developer", "content": "No emojis."}
            ]
        }));

        assert_eq!(converted["instructions"], "Be terse.\nUse Rust.\nNo emojis.");
        assert_eq!(
            converted["input"],
            json!([{"type": "message", "role": "user", "content": "hi"}])
        );
        assert_eq!(converted["stream"], false);
    }

    #[test]
    fn test_no_system_messages_means_no_instructions() {
        let converted = convert(json!({
            "model": "gpt-5-codex",
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(converted.get("instructions").is_none());
    }

    #[test]
    fn test_user_parts_joined_with_newline() {
        let converted = convert(json!({
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "line one"},
                {"type": "text", "text": "line two"}
            ]}]
        }));
        assert_eq!(converted["input"][0]["content"], "line one\nline two");
    }

    #[test]
    fn test_tool_round_trip_items() {
        let converted = convert(json!({
            "model": "gpt-5-codex",
            "messages": [
                {"role": "user", "content": "list files"},
                {
                    "role": "assistant",
                    "content": [{"type": "text", "text": "Sure"}, {"type": "text", "text": "."}],
                    "tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "ls", "arguments": "{}"}},
                        {"id": "call_b", "type": "function", "function": {"name": "pwd", "arguments": ""}}
                    ]
                },
                {"role": "tool", "tool_call_id": "call_a", "content": "src\nCargo.toml"},
                {"role": "tool", "tool_call_id": "call_b", "content": [{"type": "text", "text": "/root"}]}
            ]
        }));

        assert_eq!(
            converted["input"],
            json!([
                {"type": "message", "role": "user", "content": "list files"},
                {"type": "function_call", "call_id": "call_a", "name": "ls", "arguments": "{}"},
                {"type": "function_call", "call_id": "call_b", "name": "pwd", "arguments": ""},
                {"type": "message", "role": "assistant", "content": "Sure."},
                {"type": "function_call_output", "call_id": "call_a", "output": "src\nCargo.toml"},
                {"type": "function_call_output", "call_id": "call_b", "output": "[{\"type\":\"text\",\"text\":\"/root\"}]"}
            ])
        );
    }

    #[test]
    fn test_structured_tool_output_is_json_encoded() {
        let converted = convert(json!({
            "messages": [
                {"role": "tool", "tool_call_id": "call_w", "content": {"temp": 21}},
                {"role": "tool", "tool_call_id": "call_x"}
            ]
        }));

        assert_eq!(
            converted["input"],
            json!([
                {"type": "function_call_output", "call_id": "call_w", "output": "{\"temp\":21}"},
                {"type": "function_call_output", "call_id": "call_x", "output": ""}
            ])
        );
    }

    #[test]
    fn test_empty_system_messages_are_skipped() {
        let converted = convert(json!({
            "messages": [
                {"role": "system", "content": ""},
                {"role": "developer", "content": "x"},
                {"role": "user", "content": "hi"}
            ]
        }));
        assert_eq!(converted["instructions"], "x");

        let converted = convert(json!({
            "messages": [{"role": "system", "content": ""}, {"role": "user", "content": "hi"}]
        }));
        assert!(converted.get("instructions").is_none());
    }

    #[test]
    fn test_assistant_without_text_emits_only_calls() {
        let converted = convert(json!({
            "messages": [{
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "c", "type": "function", "function": {"name": "f", "arguments": "{}"}}]
            }]
        }));

        let input = converted["input"].as_array().unwrap();
        assert_eq!(input.len(), 1);
        assert_eq!(input[0]["type"], "function_call");
    }

    #[test]
    fn test_sampling_fields_and_tools() {
        let converted = convert(json!({
            "model": "gpt-5-codex",
            "stream": true,
            "max_tokens": 100,
            "max_completion_tokens": 200,
            "temperature": 0.2,
            "top_p": 0.9,
            "parallel_tool_calls": false,
            "tool_choice": "auto",
            "reasoning_effort": "high",
            "messages": [],
            "tools": [
                {"type": "function", "function": {
                    "name": "read",
                    "description": "Read a file",
                    "parameters": {"type": "object"}
                }},
                {"type": "function", "function": {"name": "bare"}},
                {"type": "web_search_preview"}
            ]
        }));

        assert_eq!(converted["stream"], true);
        assert_eq!(converted["max_output_tokens"], 200);
        assert_eq!(converted["temperature"], 0.2);
        assert_eq!(converted["top_p"], 0.9);
        assert_eq!(converted["parallel_tool_calls"], false);
        assert_eq!(converted["tool_choice"], "auto");
        assert_eq!(converted["reasoning"], json!({"effort": "high"}));
        assert_eq!(
            converted["tools"],
            json!([
                {"type": "function", "name": "read", "description": "Read a file", "parameters": {"type": "object"}},
                {"type": "function", "name": "bare", "description": "", "parameters": {}},
                {"type": "web_search_preview"}
            ])
        );
    }

    #[test]
    fn test_legacy_max_tokens_and_none_effort() {
        let converted = convert(json!({
            "max_tokens": 64,
            "reasoning_effort": "none",
            "messages": []
        }));

        assert_eq!(converted["max_output_tokens"], 64);
        assert!(converted.get("reasoning").is_none());
    }
}
