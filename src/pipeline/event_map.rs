//! Event mapping (SSE frame -> normalized stream signal)
//!
//! Accepted envelope shapes:
//! - typed `{type, data}` or Responses-style `{type, delta, ...}`
//! - flat `{content}` / flat `{delta}` text chunks without a type
//! - chat completion chunks `{choices:[{delta:{content, tool_calls}}]}`
//!
//! The `event:` field of the frame is used when the payload carries no `type`.

use super::decode::SseFrame;
use crate::types::events::StreamEventType;
use crate::types::ToolCall;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Normalized meaning of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    TextDelta(String),
    ToolCall(Value),
    Completed(Value),
    Canceled(Value),
    Failed(Value),
    Other(String, Value),
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Stateful per-stream mapper. State is local to each stream to avoid cross-request
/// contamination.
#[derive(Debug, Default)]
pub struct EventMapper {
    started_ids: HashSet<String>,
    index_to_id: HashMap<u64, String>,
    calls: Vec<PendingCall>,
    response_id: Option<String>,
}

fn delta_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => v
            .get("content")
            .or_else(|| v.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider response id, once any frame revealed it.
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    /// Tool calls assembled from streamed fragments so far.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.calls
            .iter()
            .map(|c| {
                ToolCall::new(
                    c.id.clone(),
                    c.name.clone(),
                    ToolCall::decode_arguments(Some(&Value::String(c.arguments.clone()))),
                )
            })
            .collect()
    }

    pub fn map(&mut self, frame: &SseFrame) -> Vec<Signal> {
        let payload: Value = match serde_json::from_str(&frame.data) {
            Ok(v) => v,
            Err(_) => {
                // non-JSON data is treated as raw text
                if frame.data.is_empty() {
                    return Vec::new();
                }
                return vec![Signal::TextDelta(frame.data.clone())];
            }
        };
        self.remember_response_id(&payload);

        let type_name = payload
            .get("type")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .or_else(|| frame.event.clone());

        if payload.get("choices").is_some() && type_name.is_none() {
            return self.map_chat_chunk(&payload);
        }

        let Some(type_name) = type_name else {
            return match payload.get("content").or_else(|| payload.get("delta")) {
                Some(v) => delta_text(v)
                    .filter(|s| !s.is_empty())
                    .map(Signal::TextDelta)
                    .into_iter()
                    .collect(),
                None => {
                    debug!(frame = %payload, "untyped frame without text ignored");
                    Vec::new()
                }
            };
        };

        // typed envelopes nest the body under `data`; Responses events keep it flat
        let body = match payload.get("data") {
            Some(inner @ Value::Object(_)) => inner.clone(),
            _ => payload.clone(),
        };

        match StreamEventType::parse(&type_name) {
            StreamEventType::OutputTextDelta => body
                .get("delta")
                .or_else(|| body.get("text"))
                .or_else(|| body.get("content"))
                .or_else(|| payload.get("data").filter(|d| !d.is_object()))
                .and_then(delta_text)
                .filter(|s| !s.is_empty())
                .map(Signal::TextDelta)
                .into_iter()
                .collect(),
            StreamEventType::ToolCallCreated => {
                self.record_call(&body);
                vec![Signal::ToolCall(body)]
            }
            StreamEventType::Completed => vec![Signal::Completed(body)],
            StreamEventType::Canceled => vec![Signal::Canceled(body)],
            StreamEventType::Error => vec![Signal::Failed(body)],
            StreamEventType::Other(name) => {
                if name == "response.output_item.added" || name == "response.output_item.done" {
                    if let Some(item) = body
                        .get("item")
                        .filter(|i| i.get("type").and_then(|t| t.as_str()) == Some("function_call"))
                    {
                        let call = json!({
                            "id": item.get("call_id").or_else(|| item.get("id")).cloned().unwrap_or(Value::Null),
                            "name": item.get("name").cloned().unwrap_or(Value::Null),
                            "arguments": item.get("arguments").cloned().unwrap_or(Value::Null),
                        });
                        let first = self.record_call(&call);
                        return if first {
                            vec![Signal::ToolCall(call)]
                        } else {
                            Vec::new()
                        };
                    }
                }
                vec![Signal::Other(name, body)]
            }
        }
    }

    fn remember_response_id(&mut self, payload: &Value) {
        if self.response_id.is_some() {
            return;
        }
        let id = payload
            .get("response")
            .and_then(|r| r.get("id"))
            .or_else(|| payload.get("response_id"))
            .and_then(|v| v.as_str());
        if let Some(id) = id {
            self.response_id = Some(id.to_string());
        }
    }

    /// Track a tool call; returns true the first time its id is seen.
    fn record_call(&mut self, call: &Value) -> bool {
        let Some(id) = call.get("id").and_then(|v| v.as_str()) else {
            return false;
        };
        let arguments = match call.get("arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(v) => v.to_string(),
        };
        if let Some(existing) = self.calls.iter_mut().find(|c| c.id == id) {
            if !arguments.is_empty() {
                existing.arguments = arguments;
            }
            return false;
        }
        self.started_ids.insert(id.to_string());
        self.calls.push(PendingCall {
            id: id.to_string(),
            name: call
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            arguments,
        });
        true
    }

    fn map_chat_chunk(&mut self, chunk: &Value) -> Vec<Signal> {
        let mut out = Vec::new();
        let Some(delta) = chunk
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
        else {
            return out;
        };

        if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
            if !text.is_empty() {
                out.push(Signal::TextDelta(text.to_string()));
            }
        }

        let Some(calls) = delta.get("tool_calls").and_then(|t| t.as_array()) else {
            return out;
        };
        for (pos, tc) in calls.iter().enumerate() {
            // later fragments omit the id and only carry the index
            let index = tc
                .get("index")
                .and_then(|v| v.as_u64())
                .unwrap_or(pos as u64);
            let id = match tc.get("id").and_then(|v| v.as_str()) {
                Some(id) => {
                    self.index_to_id.insert(index, id.to_string());
                    Some(id.to_string())
                }
                None => self.index_to_id.get(&index).cloned(),
            };
            let Some(id) = id else { continue };
            let function = tc.get("function");
            let name = function
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str());
            let fragment = function
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            if self.started_ids.insert(id.clone()) {
                let name = name.unwrap_or_default().to_string();
                self.calls.push(PendingCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: fragment.to_string(),
                });
                let mut data = Map::new();
                data.insert("id".into(), json!(id));
                data.insert("name".into(), json!(name));
                data.insert("index".into(), json!(index));
                out.push(Signal::ToolCall(Value::Object(data)));
            } else if let Some(call) = self.calls.iter_mut().find(|c| c.id == id) {
                call.arguments.push_str(fragment);
            }
        }
        out
    }
}
