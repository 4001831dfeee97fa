//! Claude prompt-cache annotation
//!
//! Marks three breakpoints as cacheable: the end of the system prompt, the end of the most recent
//! caller turn, and the last tool definition. Blocks that already carry a marker are left alone so
//! the pass can run any number of times.

use crate::schemas::chat_completions::{ChatCompletionRequest, ChatMessage, ContentPart, MessageContent};
use serde_json::{Value, json};

fn ephemeral() -> Value {
    json!({"type": "ephemeral"})
}

pub fn annotate_cache(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    if let Some(system) = request.messages.iter_mut().rev().find(|m| m.is_system()) {
        mark_final_block(system, false);
    }

    if let Some(turn) = request
        .messages
        .iter_mut()
        .rev()
        .find(|m| !m.is_system() && !m.is_assistant())
    {
        mark_final_block(turn, true);
    }

    if let Some(function) = request
        .tools
        .as_mut()
        .and_then(|tools| tools.last_mut())
        .and_then(|tool| tool.function.as_mut())
    {
        function.cache_control.get_or_insert_with(ephemeral);
    }

    request
}

/// Put the cache marker on the message's final content block, wrapping plain text in a block.
fn mark_final_block(message: &mut ChatMessage, skip_empty: bool) {
    match &mut message.content {
        Some(MessageContent::Text(text)) => {
            if skip_empty && text.is_empty() {
                return;
            }
            let block = ContentPart {
                cache_control: Some(ephemeral()),
                ..ContentPart::text(std::mem::take(text))
            };
            message.content = Some(MessageContent::Parts(vec![block]));
        }
        Some(MessageContent::Parts(parts)) => {
            let Some(last) = parts.last_mut() else {
                return;
            };
            if skip_empty && is_empty_block(last) {
                return;
            }
            last.cache_control.get_or_insert_with(ephemeral);
        }
        Some(MessageContent::Other(_)) | None => {}
    }
}

/// Anthropic rejects cache markers on blocks with nothing to cache.
fn is_empty_block(part: &ContentPart) -> bool {
    match part.kind.as_deref() {
        Some("text") | None => part.text.as_deref().unwrap_or("").is_empty(),
        Some("tool_result") => is_empty_tool_result(part.content.as_ref()),
        _ => false,
    }
}

fn is_empty_tool_result(content: Option<&Value>) -> bool {
    match content {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.iter().all(|item| {
            item.get("text")
                .and_then(Value::as_str)
                .is_none_or(str::is_empty)
        }),
        Some(_) => false,
    }
}
