//! Codestral: rejects function tools whose `strict` flag is null or missing.

use crate::schemas::chat_completions::ChatCompletionRequest;

pub fn normalize(mut request: ChatCompletionRequest) -> ChatCompletionRequest {
    for function in request
        .tools
        .iter_mut()
        .flatten()
        .filter_map(|tool| tool.as_function_mut())
    {
        function.strict.get_or_insert(false);
    }
    request
}
