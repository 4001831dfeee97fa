//! ChatGPT: rejects the explicit `reasoning_effort: "none"` some clients send.

use crate::schemas::chat_completions::ChatCompletionRequest;

/// Sentinel some clients use to mean "no reasoning"
pub const REASONING_EFFORT_NONE: &str = "none";

pub fn normalize(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    if request.reasoning_effort.as_deref() == Some(REASONING_EFFORT_NONE) {
        request.reasoning_effort = None;
    }
    request
}
