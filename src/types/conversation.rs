//! Conversation items owned by the external conversation store.

use super::tool::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Message,
    ToolCall,
    ToolResult,
}

/// Content part of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "input_file")]
    File { file_id: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

/// A role-tagged message, a tool call requested by the model, or a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, set on tool call items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool arguments, set on tool call items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl ConversationItem {
    pub fn message(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: ItemType::Message,
            role: Some(role),
            content: vec![ContentPart::text(text)],
            tool_call_id: None,
            name: None,
            arguments: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::message(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::message(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::message(Role::Assistant, text)
    }

    /// Record of a model-requested tool invocation.
    pub fn tool_call(call: &ToolCall) -> Self {
        Self {
            id: None,
            item_type: ItemType::ToolCall,
            role: Some(Role::Assistant),
            content: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            arguments: Some(call.arguments.clone()),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: ItemType::ToolResult,
            role: None,
            content: vec![ContentPart::text(text)],
            tool_call_id: Some(tool_call_id.into()),
            name: None,
            arguments: None,
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::File { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn is_tool_result(&self) -> bool {
        self.item_type == ItemType::ToolResult
    }
}
