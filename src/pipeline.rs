//! The request half of the proxy: classify, normalize or convert, decide the response fix
//!
//! Everything here is synchronous and pure, so the handler only has to deal with I/O.

use crate::codex;
use crate::family::{Family, ResponseFix};
use crate::normalize;
use crate::schemas::chat_completions::ChatCompletionRequest;
use axum::http::Method;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, instrument, warn};

const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

/// Whether a request is a chat completion call that should be prepared; everything else is
/// forwarded verbatim.
pub fn is_chat_completion(method: &Method, path: &str) -> bool {
    *method == Method::POST && path.ends_with(CHAT_COMPLETIONS_SUFFIX)
}

/// A request ready to be forwarded
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    /// The body to send upstream
    pub body: Bytes,
    /// The upstream path (and query)
    pub path: String,
    /// How to post-process the upstream response
    pub fix: ResponseFix,
    /// Whether the caller asked for a streamed response
    pub stream: bool,
    /// The requested model, if the body named one
    pub model: Option<String>,
}

impl Prepared {
    /// Forward `body` to `path` untouched.
    pub fn passthrough(path: &str, body: Bytes) -> Self {
        Self {
            body,
            path: path.to_string(),
            fix: ResponseFix::None,
            stream: false,
            model: None,
        }
    }
}

/// Prepare a chat completion request body for forwarding.
///
/// A body that isn't a chat completion request, or whose model matches no family, is forwarded
/// byte-for-byte.
#[instrument(skip(body), fields(body_len = body.len()))]
pub fn prepare(path: &str, body: Bytes) -> Prepared {
    let Some(request) = ChatCompletionRequest::parse_lenient(&body) else {
        return Prepared::passthrough(path, body);
    };

    let families: Vec<Family> = Family::matching(request.model.as_deref()).collect();
    let stream = request.is_streaming();
    let model = request.model.clone();

    if families.contains(&Family::Codex) {
        debug!("Converting request to the responses protocol");
        let Some(converted) = encode(&codex::to_responses_request(&request)) else {
            return Prepared::passthrough(path, body);
        };
        return Prepared {
            body: converted,
            path: codex::rewrite_path(path),
            fix: ResponseFix::Codex,
            stream,
            model,
        };
    }

    let normalized = normalize::apply(request, &families);
    let fix = ResponseFix::decide(&families, normalized.had_thinking);
    debug!(?families, ?fix, "Prepared request");

    let body = if families.is_empty() {
        body
    } else {
        encode(&normalized.request).unwrap_or(body)
    };

    Prepared {
        body,
        path: path.to_string(),
        fix,
        stream,
        model,
    }
}

fn encode<T: Serialize>(value: &T) -> Option<Bytes> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(Bytes::from(bytes)),
        Err(e) => {
            warn!(error = %e, "Failed to encode rewritten request, forwarding the original");
            None
        }
    }
}
