//! Per-family request normalizers
//!
//! Each normalizer takes a request by value and returns the adjusted request. They run in a fixed
//! order, and only for the families the model matched:
//!
//! 1. Gemini: inline tool schema references, normalize thinking
//! 2. Codestral: default `strict` on function tools
//! 3. Claude: annotate prompt-cache breakpoints, then normalize thinking
//! 4. ChatGPT: drop `reasoning_effort: "none"`

pub mod chatgpt;
pub mod claude;
pub mod codestral;
pub mod gemini;
pub mod thinking;

use crate::family::Family;
use crate::schemas::chat_completions::ChatCompletionRequest;
use tracing::{debug, instrument};

/// A request after every applicable normalizer has run
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub request: ChatCompletionRequest,
    /// Whether the request carried a thinking block when it came in (even a disabled one)
    pub had_thinking: bool,
}

/// Run every normalizer whose family is in `families`, in the fixed order.
#[instrument(skip(request), fields(model = request.model.as_deref()))]
pub fn apply(request: ChatCompletionRequest, families: &[Family]) -> Normalized {
    let had_thinking = request.thinking.is_some();
    let mut request = request;

    if families.contains(&Family::Gemini) {
        debug!("Applying Gemini normalization");
        request = thinking::normalize(gemini::normalize(request));
    }

    if families.contains(&Family::Codestral) {
        debug!("Applying Codestral normalization");
        request = codestral::normalize(request);
    }

    if families.contains(&Family::Claude) {
        debug!("Applying Claude normalization");
        request = thinking::normalize(claude::annotate_cache(request));
    }

    if families.contains(&Family::ChatGpt) {
        debug!("Applying ChatGPT normalization");
        request = chatgpt::normalize(request);
    }

    Normalized {
        request,
        had_thinking,
    }
}
