//! Gemini: no local `$ref` support in tool schemas.

use crate::schema::resolve_refs;
use crate::schemas::chat_completions::ChatCompletionRequest;

/// Inline schema references in every function tool's parameters.
pub fn normalize(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    for function in request
        .tools
        .iter_mut()
        .flatten()
        .filter_map(|tool| tool.as_function_mut())
    {
        if let Some(parameters) = function.parameters.as_mut() {
            *parameters = resolve_refs(parameters);
        }
    }
    request
}
