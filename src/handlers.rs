/// Axum handlers for the proxy server
use crate::AppState;
use crate::client::HttpClient;
use crate::codex::{self, ResponsesStreamConverter};
use crate::errors::ProxyError;
use crate::family::ResponseFix;
use crate::pipeline::{self, Prepared};
use crate::rewrite::StreamRewriter;
use crate::schemas::responses::ResponsesResponse;
use crate::sse::{SseTransform, transform_body};
use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderValue,
        header::{ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST},
    },
    response::Response,
};
use tracing::{debug, error, info, instrument};

/// Forward every request to the upstream gateway, repairing chat completion traffic on the way.
#[instrument(skip(state, req), fields(method = %req.method(), path = %req.uri().path()))]
pub async fn proxy_handler<T: HttpClient>(
    State(state): State<AppState<T>>,
    mut req: axum::extract::Request,
) -> Result<Response, ProxyError> {
    let body_bytes = axum::body::to_bytes(std::mem::take(req.body_mut()), usize::MAX)
        .await
        .map_err(ProxyError::RequestBody)?;

    let path = req.uri().path().to_string();
    let Prepared {
        body,
        path: upstream_path,
        fix,
        stream,
        model,
    } = if pipeline::is_chat_completion(req.method(), &path) {
        debug!("Received chat completion request of size: {}", body_bytes.len());
        pipeline::prepare(&path, body_bytes)
    } else {
        Prepared::passthrough(&path, body_bytes)
    };

    if let Some(model) = &model {
        info!(model = %model, ?fix, stream, "Forwarding chat completion");
    }

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{upstream_path}?{query}"),
        None => upstream_path,
    };
    let upstream_uri = state.upstream.uri_for(&path_and_query)?;
    *req.uri_mut() = upstream_uri.clone();

    // The host header has to name the upstream, not us (CDNs in front of the gateway check it).
    if let Some(host) = state
        .upstream
        .host_header()
        .and_then(|host| HeaderValue::from_str(&host).ok())
    {
        req.headers_mut().insert(HOST, host);
    }

    // Responses we rewrite have to arrive uncompressed
    if fix != ResponseFix::None {
        req.headers_mut().remove(ACCEPT_ENCODING);
    }

    if !body.is_empty() || req.headers().contains_key(CONTENT_LENGTH) {
        req.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    *req.body_mut() = Body::from(body);

    let response = state.http_client.request(req).await.map_err(|e| {
        error!("Error forwarding request to upstream url {}: {}", upstream_uri, e);
        ProxyError::Upstream(e)
    })?;

    if !response.status().is_success() {
        debug!(status = %response.status(), "Passing upstream error through");
        return Ok(response);
    }

    match (fix, stream) {
        (ResponseFix::None, _) => Ok(response),
        (ResponseFix::Codex, false) => codex_response(response, model.as_deref()).await,
        (ResponseFix::Codex, true) => Ok(streamed(
            response,
            ResponsesStreamConverter::new(model),
            true,
        )),
        (_, true) => Ok(streamed(response, StreamRewriter::new(fix), false)),
        (_, false) => Ok(response),
    }
}

/// Convert a whole Responses body into a chat completion.
async fn codex_response(response: Response, model: Option<&str>) -> Result<Response, ProxyError> {
    let (mut parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(ProxyError::ResponseBody)?;

    let parsed: ResponsesResponse = serde_json::from_slice(&bytes).map_err(|e| {
        error!(error = %e, "Upstream responses body is not valid");
        ProxyError::UpstreamParse(e)
    })?;
    let converted = serde_json::to_vec(&codex::to_chat_response(parsed, model))?;

    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(converted.len()));

    Ok(Response::from_parts(parts, Body::from(converted)))
}

/// Run a streamed body through `transform`.
fn streamed<S: SseTransform>(response: Response, transform: S, event_stream: bool) -> Response {
    let (mut parts, body) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    if event_stream {
        parts
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    }

    Response::from_parts(parts, transform_body(body, transform))
}
