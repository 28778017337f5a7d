//! Streaming events emitted by the streaming engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event discriminator. Unrecognized provider types are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StreamEventType {
    OutputTextDelta,
    ToolCallCreated,
    Completed,
    Canceled,
    Error,
    Other(String),
}

impl StreamEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::OutputTextDelta => "response.output_text.delta",
            Self::ToolCallCreated => "response.tool_call.created",
            Self::Completed => "response.completed",
            Self::Canceled => "response.canceled",
            Self::Error => "error",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "response.output_text.delta" | "output_text.delta" | "text.delta" => {
                Self::OutputTextDelta
            }
            "response.tool_call.created" => Self::ToolCallCreated,
            "response.completed" | "response.done" => Self::Completed,
            "response.canceled" | "response.cancelled" => Self::Canceled,
            "error" | "response.error" | "response.failed" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StreamEventType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<StreamEventType> for String {
    fn from(t: StreamEventType) -> Self {
        t.as_str().to_string()
    }
}

/// One typed streaming event. Consumed once by the caller, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    pub data: Value,
    #[serde(default)]
    pub is_final: bool,
}

impl StreamingEvent {
    pub fn new(event_type: StreamEventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            is_final: false,
        }
    }

    pub fn final_event(event_type: StreamEventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            is_final: true,
        }
    }

    pub fn is_text_delta(&self) -> bool {
        self.event_type == StreamEventType::OutputTextDelta
    }

    /// Incremental fragment of a text delta.
    pub fn delta(&self) -> Option<&str> {
        self.data.get("delta").and_then(|v| v.as_str())
    }

    /// Full text observed so far (set on deltas and on the completion event).
    pub fn accumulated(&self) -> Option<&str> {
        self.data.get("accumulated").and_then(|v| v.as_str())
    }
}
