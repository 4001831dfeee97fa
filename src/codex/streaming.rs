//! Responses event stream → Chat Completions chunk stream
//!
//! The Responses protocol streams typed item/event records; callers expect `chat.completion.chunk`
//! deltas. The converter is a small state machine, one instance per response body:
//!
//! - `response.output_item.added` (message): announce the assistant role once
//! - `response.output_text.delta`: announce the role if needed, then a content delta
//! - `response.output_item.added` (function_call): allocate the next tool-call index for the item
//! - `response.function_call_arguments.delta`: an argument delta at the item's index
//! - `response.completed` / `response.incomplete`: a final chunk with finish reason and usage,
//!   then `data: [DONE]`

use super::{finish_reason, generate_completion_id, translate_usage, unix_now};
use crate::schemas::chat_completions::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkFunctionCall, ChunkToolCall, Usage,
};
use crate::schemas::responses::{OutputItem, ResponsesResponse, ResponsesStreamEvent};
use crate::sse::{SseTransform, drain_events};
use std::collections::HashMap;
use tracing::{debug, trace};

const DONE_RECORD: &str = "data: [DONE]\n\n";

pub struct ResponsesStreamConverter {
    id: String,
    model: Option<String>,
    created: u64,
    role_sent: bool,
    /// Output item id → tool call index, in first-seen order
    indices: HashMap<String, u32>,
    next_index: u32,
    /// Unterminated tail of the incoming text
    buffer: String,
    finished: bool,
}

impl ResponsesStreamConverter {
    pub fn new(model: Option<String>) -> Self {
        Self {
            id: generate_completion_id(),
            model,
            created: unix_now(),
            role_sent: false,
            indices: HashMap::new(),
            next_index: 0,
            buffer: String::new(),
            finished: false,
        }
    }

    fn process_segment(&mut self, segment: &str, out: &mut String) {
        let Some(payload) = data_payload(segment) else {
            return;
        };
        if payload.trim() == "[DONE]" {
            return;
        }

        match serde_json::from_str::<ResponsesStreamEvent>(&payload) {
            Ok(event) => self.handle(event, out),
            Err(e) => debug!(error = %e, "Dropping unparsable responses stream record"),
        }
    }

    fn handle(&mut self, event: ResponsesStreamEvent, out: &mut String) {
        match event {
            ResponsesStreamEvent::OutputItemAdded {
                item: OutputItem::Message { .. },
            } => self.announce_role(out),

            ResponsesStreamEvent::OutputItemAdded {
                item:
                    OutputItem::FunctionCall {
                        id, call_id, name, ..
                    },
            } => {
                let index = self.next_index;
                self.next_index += 1;
                self.indices
                    .insert(id.unwrap_or_else(|| call_id.clone()), index);
                trace!(index, name = %name, "New tool call");

                self.emit(
                    out,
                    ChunkDelta {
                        tool_calls: Some(vec![ChunkToolCall {
                            index,
                            id: Some(call_id),
                            call_type: Some("function".to_string()),
                            function: ChunkFunctionCall {
                                name: Some(name),
                                arguments: Some(String::new()),
                            },
                        }]),
                        ..Default::default()
                    },
                    None,
                    None,
                );
            }

            ResponsesStreamEvent::OutputTextDelta { delta } => {
                self.announce_role(out);
                self.emit(
                    out,
                    ChunkDelta {
                        content: Some(delta),
                        ..Default::default()
                    },
                    None,
                    None,
                );
            }

            ResponsesStreamEvent::FunctionCallArgumentsDelta { item_id, delta } => {
                let index = item_id
                    .and_then(|id| self.indices.get(&id).copied())
                    .unwrap_or(0);
                self.emit(
                    out,
                    ChunkDelta {
                        tool_calls: Some(vec![ChunkToolCall {
                            index,
                            id: None,
                            call_type: None,
                            function: ChunkFunctionCall {
                                name: None,
                                arguments: Some(delta),
                            },
                        }]),
                        ..Default::default()
                    },
                    None,
                    None,
                );
            }

            ResponsesStreamEvent::Completed { response } => self.complete(response, false, out),
            ResponsesStreamEvent::Incomplete { response } => self.complete(response, true, out),

            ResponsesStreamEvent::OutputItemAdded {
                item: OutputItem::Other,
            }
            | ResponsesStreamEvent::Other => {}
        }
    }

    fn announce_role(&mut self, out: &mut String) {
        if self.role_sent {
            return;
        }
        self.role_sent = true;
        self.emit(
            out,
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
                ..Default::default()
            },
            None,
            None,
        );
    }

    fn complete(
        &mut self,
        response: Option<ResponsesResponse>,
        truncated: bool,
        out: &mut String,
    ) {
        if self.finished {
            debug!("Ignoring repeated terminal responses event");
            return;
        }
        self.finished = true;

        let response = response.unwrap_or_default();
        let reason = finish_reason(&response, truncated);
        let usage = response.usage.as_ref().map(translate_usage);

        self.emit(out, ChunkDelta::default(), Some(reason), usage);
        out.push_str(DONE_RECORD);
    }

    fn emit(
        &self,
        out: &mut String,
        delta: ChunkDelta,
        finish_reason: Option<&str>,
        usage: Option<Usage>,
    ) {
        let chunk = ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage,
        };
        out.push_str(&chunk.to_sse());
    }
}

impl SseTransform for ResponsesStreamConverter {
    fn push(&mut self, text: &str) -> String {
        self.buffer.push_str(text);

        let mut out = String::new();
        for segment in drain_events(&mut self.buffer) {
            self.process_segment(&segment, &mut out);
        }
        out
    }

    fn finish(&mut self) -> String {
        let mut out = String::new();

        // The unterminated tail is parsed one `data:` line at a time.
        let tail = std::mem::take(&mut self.buffer);
        for line in tail.lines().filter(|line| line.starts_with("data:")) {
            self.process_segment(line, &mut out);
        }

        if !self.finished {
            debug!("Responses stream ended without a terminal event");
            self.finished = true;
            out.push_str(DONE_RECORD);
        }
        out
    }
}

/// The `data:` payload of an SSE record, with multi-line data joined by `\n`.
fn data_payload(segment: &str) -> Option<String> {
    let lines: Vec<&str> = segment
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}
