//! Chat Completions stream repair for the Gemini and Claude families
//!
//! Both providers stream almost-compatible chunks. Each complete `data:` record is parsed into a
//! loosely typed chunk, patched, and re-serialized only if a patch applied; every other byte of
//! the stream passes through untouched.

use crate::family::ResponseFix;
use crate::sse::{SseTransform, drain_events};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

const DONE_RECORD: &str = "data: [DONE]\n\n";
const DONE_MARKER: &str = "[DONE]";

/// A streamed chunk, typed only as far as the patches need
#[derive(Debug, Serialize, Deserialize)]
struct UpstreamChunk {
    choices: Vec<UpstreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<UpstreamUsage>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpstreamChoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<UpstreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpstreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_blocks: Option<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UpstreamUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_tokens_details: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Repairs a non-Codex chunk stream according to a [`ResponseFix`].
pub struct StreamRewriter {
    fix: ResponseFix,
    buffer: String,
    saw_done: bool,
}

impl StreamRewriter {
    pub fn new(fix: ResponseFix) -> Self {
        Self {
            fix,
            buffer: String::new(),
            saw_done: false,
        }
    }

    /// Rewrite one complete record, line by line.
    fn rewrite_record(&mut self, record: &str) -> String {
        let mut out = String::with_capacity(record.len());
        for line in record.split_inclusive('\n') {
            if line.strip_prefix("data:").map(str::trim) == Some(DONE_MARKER) {
                self.saw_done = true;
            }

            match line
                .strip_prefix("data: ")
                .and_then(|rest| self.rewrite_payload(rest.trim_end_matches(['\r', '\n'])))
            {
                Some(patched) => {
                    out.push_str("data: ");
                    out.push_str(&patched);
                    out.push_str(&line[line.trim_end_matches(['\r', '\n']).len()..]);
                }
                None => out.push_str(line),
            }
        }
        out
    }

    /// The patched JSON payload, or `None` if the record should pass through verbatim.
    fn rewrite_payload(&self, payload: &str) -> Option<String> {
        if !payload.starts_with('{') {
            return None;
        }
        let mut chunk: UpstreamChunk = serde_json::from_str(payload).ok()?;

        let mut changed = false;
        if self.fix.patches_gemini() {
            changed |= patch_gemini(&mut chunk);
        }
        if self.fix.patches_claude() {
            changed |= patch_claude(&mut chunk);
        }

        if !changed {
            return None;
        }
        match serde_json::to_string(&chunk) {
            Ok(patched) => Some(patched),
            Err(e) => {
                debug!(error = %e, "Failed to re-serialize patched chunk, passing through");
                None
            }
        }
    }
}

impl SseTransform for StreamRewriter {
    fn push(&mut self, text: &str) -> String {
        self.buffer.push_str(text);

        let mut out = String::new();
        for record in drain_events(&mut self.buffer) {
            out.push_str(&self.rewrite_record(&record));
        }
        out
    }

    fn finish(&mut self) -> String {
        let tail = std::mem::take(&mut self.buffer);
        let mut out = if tail.is_empty() {
            String::new()
        } else {
            self.rewrite_record(&tail)
        };

        if !self.saw_done {
            trace!("Upstream stream ended without [DONE], appending it");
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str("\n\n");
            }
            out.push_str(DONE_RECORD);
            self.saw_done = true;
        }
        out
    }
}

fn patch_gemini(chunk: &mut UpstreamChunk) -> bool {
    let mut changed = false;

    for choice in &mut chunk.choices {
        if choice.finish_reason.as_deref() == Some("STOP") {
            choice.finish_reason = Some("stop".to_string());
            changed = true;
        }

        let Some(delta) = choice.delta.as_mut() else {
            continue;
        };

        let has_tool_calls = delta.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty());
        if choice.finish_reason.as_deref() == Some("stop") && has_tool_calls {
            choice.finish_reason = Some("tool_calls".to_string());
            changed = true;
        }

        if let Some(thinking) = delta.content_blocks.as_deref().and_then(thinking_text) {
            delta.reasoning_content = Some(thinking);
            delta.content_blocks = None;
            changed = true;
        }
    }

    changed
}

/// Concatenated text of every thinking block, if there is any.
fn thinking_text(blocks: &[Value]) -> Option<String> {
    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("thinking"))
        .filter_map(|block| {
            block
                .get("thinking")
                .or_else(|| block.get("text"))
                .and_then(Value::as_str)
        })
        .collect();

    (!text.is_empty()).then_some(text)
}

fn patch_claude(chunk: &mut UpstreamChunk) -> bool {
    let mut changed = false;

    for choice in &mut chunk.choices {
        if choice.finish_reason.as_deref() == Some("end_turn") {
            choice.finish_reason = Some("stop".to_string());
            changed = true;
        }
    }

    if let Some(usage) = chunk.usage.as_mut() {
        let cached = usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.get("cached_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if cached > 0 {
            usage.prompt_tokens = Some(usage.prompt_tokens.unwrap_or(0).saturating_add(cached));
            changed = true;
        }
    }

    changed
}
