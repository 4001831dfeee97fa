//! Integration tests for the nexos-compat proxy
//!
//! These drive the full router with a scripted upstream and check what the caller sees.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use nexos_compat::client::HttpClient;
use nexos_compat::family::ResponseFix;
use nexos_compat::pipeline;
use nexos_compat::upstream::Upstream;
use nexos_compat::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt; // for oneshot()

/// Replays a fixed list of body chunks and records the forwarded request bodies
#[derive(Debug, Clone)]
struct ScriptedUpstream {
    chunks: Vec<Bytes>,
    forwarded: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl ScriptedUpstream {
    fn new(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            forwarded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn forwarded(&self) -> Vec<(String, Vec<u8>)> {
        self.forwarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedUpstream {
    async fn request(
        &self,
        req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
        let uri = req.uri().to_string();
        let body = axum::body::to_bytes(req.into_body(), usize::MAX).await?;
        self.forwarded.lock().unwrap().push((uri, body.to_vec()));

        let stream = futures_util::stream::iter(
            self.chunks
                .clone()
                .into_iter()
                .map(Ok::<_, std::io::Error>),
        );
        Ok(axum::response::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from_stream(stream))?)
    }
}

fn app(upstream: ScriptedUpstream) -> axum::Router {
    let base = Upstream::builder()
        .url("https://gateway.example.com/api/".parse().unwrap())
        .build();
    build_router(AppState::with_client(base, upstream))
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_codex_stream_without_completed_event_still_terminates() {
    let upstream = ScriptedUpstream::new(&[
        b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"caf\xC3",
        b"\xA9\"}\n\n",
        b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"!\"}\n\n",
    ]);

    let response = app(upstream.clone())
        .oneshot(chat_request(json!({
            "model": "gpt-5.1-codex",
            "stream": true,
            "messages": [{"role": "user", "content": "coffee?"}]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("\"content\":\"café\""));
    assert!(text.contains("\"content\":\"!\""));
    assert!(text.ends_with("data: [DONE]\n\n"));
    assert_eq!(text.matches("[DONE]").count(), 1);

    let forwarded = upstream.forwarded();
    assert_eq!(forwarded[0].0, "https://gateway.example.com/api/v1/responses");
    let body: Value = serde_json::from_slice(&forwarded[0].1).unwrap();
    assert_eq!(body["stream"], true);
    assert_eq!(
        body["input"],
        json!([{"type": "message", "role": "user", "content": "coffee?"}])
    );
}

#[tokio::test]
async fn test_claude_stream_reports_cached_prompt_tokens() {
    let upstream = ScriptedUpstream::new(&[
        b"data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
        b"data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"end_turn\"}],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":1,\"total_tokens\":5,\"prompt_tokens_details\":{\"cached_tokens\":2000}}}\n\n",
        b"data: [DONE]\n\n",
    ]);

    let response = app(upstream)
        .oneshot(chat_request(json!({
            "model": "claude-3-7-sonnet",
            "stream": true,
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .await
        .unwrap();

    let text = body_text(response).await;
    let records: Vec<&str> = text.split("\n\n").filter(|r| !r.is_empty()).collect();
    assert_eq!(records.len(), 3);

    let last: Value = serde_json::from_str(records[1].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert_eq!(last["usage"]["prompt_tokens"], 2004);
    assert_eq!(last["usage"]["prompt_tokens_details"]["cached_tokens"], 2000);
    assert_eq!(records[2], "data: [DONE]");
}

#[tokio::test]
async fn test_codestral_tools_are_forwarded_with_strict_flag() {
    let upstream = ScriptedUpstream::new(&[b"{\"id\":\"ok\"}"]);

    let response = app(upstream.clone())
        .oneshot(chat_request(json!({
            "model": "codestral-2508",
            "messages": [{"role": "user", "content": "fix it"}],
            "tools": [
                {"type": "function", "function": {"name": "apply_patch", "parameters": {"type": "object"}}},
                {"type": "function", "function": {"name": "run_tests", "strict": true}}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(body_text(response).await, "{\"id\":\"ok\"}");

    let forwarded = upstream.forwarded();
    let body: Value = serde_json::from_slice(&forwarded[0].1).unwrap();
    assert_eq!(body["tools"][0]["function"]["strict"], false);
    assert_eq!(body["tools"][1]["function"]["strict"], true);
    assert_eq!(forwarded[0].0, "https://gateway.example.com/api/v1/chat/completions");
}

#[test]
fn test_preparing_twice_is_stable() {
    let body = Bytes::from(
        serde_json::to_vec(&json!({
            "model": "gemini-claude-bridge",
            "max_tokens": 100,
            "thinking": {"type": "enabled", "budgetTokens": 1000},
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": [{"type": "text", "text": "hi"}]}
            ],
            "tools": [{"type": "function", "function": {
                "name": "f",
                "parameters": {"properties": {"x": {"$ref": "#/$defs/X"}}, "$defs": {"X": {"type": "number"}}}
            }}]
        }))
        .unwrap(),
    );

    let once = pipeline::prepare("/v1/chat/completions", body);
    assert_eq!(once.fix, ResponseFix::Composite);

    let twice = pipeline::prepare("/v1/chat/completions", once.body.clone());
    let first: Value = serde_json::from_slice(&once.body).unwrap();
    let second: Value = serde_json::from_slice(&twice.body).unwrap();
    assert_eq!(first, second);
    assert_eq!(first["max_tokens"], 5096);
}

#[tokio::test]
async fn test_crlf_gemini_stream_is_repaired() {
    let upstream = ScriptedUpstream::new(&[
        b"data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"STOP\"}]}\r\n",
        b"\r\n",
    ]);

    let response = app(upstream)
        .oneshot(chat_request(json!({
            "model": "gemini-2.5-flash",
            "stream": true,
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .await
        .unwrap();

    let text = body_text(response).await;
    assert!(text.contains("\"finish_reason\":\"stop\""));
    assert!(text.ends_with("\r\n\r\ndata: [DONE]\n\n"));
    assert_eq!(text.matches("[DONE]").count(), 1);
}
