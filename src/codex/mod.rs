//! Chat Completions ↔ Responses protocol conversion for the Codex family
//!
//! Codex models are only served over the Responses API. Requests are converted on the way out,
//! the endpoint path is rewritten, and responses (both whole and streamed) are converted back so
//! callers only ever see Chat Completions.

pub mod request;
pub mod response;
pub mod streaming;

pub use request::to_responses_request;
pub use response::to_chat_response;
pub use streaming::ResponsesStreamConverter;

use crate::schemas::chat_completions::{CompletionTokensDetails, PromptTokensDetails, Usage};
use crate::schemas::responses::{ResponsesResponse, ResponsesUsage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";
const RESPONSES_SUFFIX: &str = "/responses";

/// Rewrite a trailing `/chat/completions` to `/responses`; other paths are returned as-is.
pub fn rewrite_path(path: &str) -> String {
    match path.strip_suffix(CHAT_COMPLETIONS_SUFFIX) {
        Some(prefix) => format!("{prefix}{RESPONSES_SUFFIX}"),
        None => path.to_string(),
    }
}

/// Pick the Chat Completions finish reason for a finished response.
fn finish_reason(response: &ResponsesResponse, truncated: bool) -> &'static str {
    if response.has_function_call() {
        "tool_calls"
    } else if truncated {
        "length"
    } else {
        "stop"
    }
}

/// Translate Responses usage into the Chat Completions shape, keeping the detail counts.
fn translate_usage(usage: &ResponsesUsage) -> Usage {
    Usage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
        prompt_tokens_details: Some(PromptTokensDetails {
            cached_tokens: usage
                .input_tokens_details
                .as_ref()
                .map_or(0, |d| d.cached_tokens),
        }),
        completion_tokens_details: Some(CompletionTokensDetails {
            reasoning_tokens: usage
                .output_tokens_details
                .as_ref()
                .map_or(0, |d| d.reasoning_tokens),
        }),
    }
}

static COMPLETION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique chat completion ID
fn generate_completion_id() -> String {
    let count = COMPLETION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("chatcmpl-{:x}{:06x}", unix_now(), count)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
