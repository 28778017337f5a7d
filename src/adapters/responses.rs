//! Responses API adapter.
//!
//! Conversation items map onto Responses input items:
//!
//! | Item | Wire shape |
//! |------|------------|
//! | message | `{role, content}` (string, or parts when files are attached) |
//! | tool call | `{type: "function_call", call_id, name, arguments}` |
//! | tool result | `{type: "function_call_output", call_id, output}` |

use super::chat::parse_chat_tool_calls;
use super::{str_field, EndpointAdapter, EndpointRequest};
use crate::endpoint::Endpoint;
use crate::types::{
    ContentPart, ConversationItem, ItemType, ResponseDto, ResponseType, Role, ToolCall,
    UnifiedRequest,
};
use crate::Result;
use serde_json::{json, Map, Value};

pub const DEFAULT_RESPONSES_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseApiAdapter;

fn input_item(item: &ConversationItem) -> Value {
    match item.item_type {
        ItemType::Message => {
            let role = item.role.unwrap_or(Role::User);
            let has_files = item
                .content
                .iter()
                .any(|p| matches!(p, ContentPart::File { .. }));
            if has_files {
                let text_type = if role == Role::Assistant {
                    "output_text"
                } else {
                    "input_text"
                };
                let parts: Vec<Value> = item
                    .content
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => json!({"type": text_type, "text": text}),
                        ContentPart::File { file_id } => {
                            json!({"type": "input_file", "file_id": file_id})
                        }
                    })
                    .collect();
                json!({"role": role.as_str(), "content": parts})
            } else {
                json!({"role": role.as_str(), "content": item.text()})
            }
        }
        ItemType::ToolCall => json!({
            "type": "function_call",
            "call_id": item.tool_call_id.clone().unwrap_or_default(),
            "name": item.name.clone().unwrap_or_default(),
            "arguments": match &item.arguments {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => "{}".to_string(),
            },
        }),
        ItemType::ToolResult => json!({
            "type": "function_call_output",
            "call_id": item.tool_call_id.clone().unwrap_or_default(),
            "output": item.text(),
        }),
    }
}

fn build_input(request: &UnifiedRequest) -> Option<Value> {
    let files = request.attached_file_ids();
    let text = request.text.as_deref().filter(|t| !t.is_empty());
    if request.input.is_empty() && files.is_empty() {
        return text.map(|t| Value::String(t.to_string()));
    }

    let mut items: Vec<Value> = request.input.iter().map(input_item).collect();
    if text.is_some() || !files.is_empty() {
        let mut parts = Vec::new();
        if let Some(t) = text {
            parts.push(json!({"type": "input_text", "text": t}));
        }
        parts.extend(
            files
                .iter()
                .map(|id| json!({"type": "input_file", "file_id": id})),
        );
        items.push(json!({"role": "user", "content": parts}));
    }
    Some(Value::Array(items))
}

/// Responses flattens function tools: `{type, name, description, parameters}`.
fn tool_declaration(tool: &crate::types::ToolDefinition) -> Value {
    match &tool.function {
        Some(f) => {
            let mut out = Map::new();
            out.insert("type".into(), json!("function"));
            out.insert("name".into(), json!(f.name));
            if let Some(d) = &f.description {
                out.insert("description".into(), json!(d));
            }
            if let Some(p) = &f.parameters {
                out.insert("parameters".into(), p.clone());
            }
            for (k, v) in &tool.options {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        None => serde_json::to_value(tool).unwrap_or(Value::Null),
    }
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn extract_text(raw: &Value) -> Option<String> {
    if let Some(t) = str_field(raw, "output_text") {
        return Some(t);
    }
    if let Some(t) = raw.get("content").and_then(content_text) {
        return Some(t);
    }
    if let Some(t) = str_field(raw, "text") {
        return Some(t);
    }
    if let Some(t) = str_field(raw, "messages") {
        return Some(t);
    }
    let joined: String = raw
        .get("output")
        .and_then(|o| o.as_array())?
        .iter()
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    (!joined.is_empty()).then_some(joined)
}

fn extract_tool_calls(raw: &Value) -> Vec<ToolCall> {
    let mut calls: Vec<ToolCall> = raw
        .get("output")
        .and_then(|o| o.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|i| i.get("type").and_then(|t| t.as_str()) == Some("function_call"))
                .filter_map(|i| {
                    let id = str_field(i, "call_id").or_else(|| str_field(i, "id"))?;
                    let name = str_field(i, "name")?;
                    Some(ToolCall::new(
                        id,
                        name,
                        ToolCall::decode_arguments(i.get("arguments")),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    if calls.is_empty() {
        if let Some(list) = raw.get("tool_calls").and_then(|t| t.as_array()) {
            // either chat-style {id, function:{name, arguments}} or flat {id, name, arguments}
            calls = parse_chat_tool_calls(raw.get("tool_calls"));
            if calls.is_empty() {
                calls = list
                    .iter()
                    .filter_map(|c| {
                        Some(ToolCall::new(
                            str_field(c, "id")?,
                            str_field(c, "name")?,
                            ToolCall::decode_arguments(c.get("arguments")),
                        ))
                    })
                    .collect();
            }
        }
    }
    calls
}

fn extract_conversation_id(raw: &Value) -> Option<String> {
    str_field(raw, "conversation_id").or_else(|| match raw.get("conversation") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(obj) => str_field(obj, "id"),
        None => None,
    })
}

impl EndpointAdapter for ResponseApiAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ResponseApi
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let input = build_input(request).ok_or_else(|| {
            super::invalid(
                "responses request needs text, input items or attached files",
                "input",
                self.endpoint().as_str(),
            )
        })?;

        let mut out = EndpointRequest::new(self.endpoint());
        out.set(
            "model",
            request.model.as_deref().unwrap_or(DEFAULT_RESPONSES_MODEL),
        );
        out.set("input", input);
        out.set_opt("instructions", request.instructions.clone());
        out.set_opt("conversation", request.conversation_id.clone());
        out.set_opt("temperature", request.temperature);
        if !request.tools.is_empty() {
            out.set(
                "tools",
                request.tools.iter().map(tool_declaration).collect::<Vec<_>>(),
            );
        }
        out.set_opt("tool_choice", request.tool_choice.clone());
        if let Some(format) = &request.response_format {
            out.set("text", json!({ "format": format }));
        }
        if !request.modalities.is_empty() {
            out.set("modalities", request.modalities.clone());
        }
        if !request.metadata.is_empty() {
            out.set("metadata", Value::Object(request.metadata.clone()));
        }
        if request.stream {
            out.set("stream", true);
            out.stream = true;
        }
        out.idempotency_key = request.idempotency_key.clone();
        Ok(out)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        let mut dto = ResponseDto::new(ResponseType::Response, response.clone());
        dto.id = str_field(response, "id");
        if let Some(status) = str_field(response, "status") {
            dto.status = status;
        }
        dto.text = extract_text(response);
        dto.tool_calls = extract_tool_calls(response);
        dto.conversation_id = extract_conversation_id(response);
        for key in ["model", "usage", "incomplete_details"] {
            dto.copy_meta(response, key);
        }
        if let Some(created) = response.get("created_at").filter(|v| !v.is_null()) {
            dto.metadata.insert("created".into(), created.clone());
        }
        dto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDefinition;

    #[test]
    fn plain_text_input_stays_a_string() {
        let out = ResponseApiAdapter
            .transform_request(&UnifiedRequest::text("hello"))
            .unwrap();
        assert_eq!(out.get("input"), Some(&json!("hello")));
        assert_eq!(out.get("model"), Some(&json!("gpt-4o")));
        assert!(out.get("tools").is_none());
        assert!(out.get("instructions").is_none());
    }

    #[test]
    fn maps_tool_items_files_and_format() {
        let call = ToolCall::new("call_1", "lookup", json!({"q": "rust"}));
        let req = UnifiedRequest {
            text: Some("summarize".into()),
            input: vec![
                ConversationItem::user("find rust"),
                ConversationItem::tool_call(&call),
                ConversationItem::tool_result("call_1", "found"),
            ],
            file_ids: vec!["file_9".into()],
            conversation_id: Some("conv_1".into()),
            tools: vec![ToolDefinition::function("lookup", "Look up", json!({"type": "object"}))],
            response_format: Some(json!({"type": "json_object"})),
            ..Default::default()
        };
        let out = ResponseApiAdapter.transform_request(&req).unwrap();
        let input = out.get("input").unwrap().as_array().unwrap();
        assert_eq!(input[0], json!({"role": "user", "content": "find rust"}));
        assert_eq!(input[1]["type"], "function_call");
        assert_eq!(input[1]["arguments"], "{\"q\":\"rust\"}");
        assert_eq!(input[2], json!({"type": "function_call_output", "call_id": "call_1", "output": "found"}));
        assert_eq!(input[3]["content"][1], json!({"type": "input_file", "file_id": "file_9"}));
        assert_eq!(out.get("conversation"), Some(&json!("conv_1")));
        assert_eq!(out.get("tools").unwrap()[0]["name"], "lookup");
        assert_eq!(out.get("text"), Some(&json!({"format": {"type": "json_object"}})));
    }

    #[test]
    fn text_extraction_priority() {
        let a = ResponseApiAdapter
            .transform_response(&json!({"output_text": "a", "content": "b", "text": "c"}));
        assert_eq!(a.text.as_deref(), Some("a"));
        let b = ResponseApiAdapter.transform_response(&json!({"content": "b", "text": "c"}));
        assert_eq!(b.text.as_deref(), Some("b"));
        let c = ResponseApiAdapter.transform_response(&json!({"text": "c", "messages": "d"}));
        assert_eq!(c.text.as_deref(), Some("c"));
        let d = ResponseApiAdapter.transform_response(&json!({"messages": "d"}));
        assert_eq!(d.text.as_deref(), Some("d"));
        let e = ResponseApiAdapter.transform_response(&json!({
            "output": [{"type": "message", "content": [
                {"type": "output_text", "text": "Hel"},
                {"type": "output_text", "text": "lo"}
            ]}]
        }));
        assert_eq!(e.text.as_deref(), Some("Hello"));
        let none = ResponseApiAdapter.transform_response(&json!({"messages": ["not", "text"]}));
        assert!(none.text.is_none());
    }

    #[test]
    fn tool_calls_and_conversation_id() {
        let dto = ResponseApiAdapter.transform_response(&json!({
            "id": "resp_1",
            "status": "requires_action",
            "conversation": {"id": "conv_7"},
            "output": [{
                "type": "function_call",
                "call_id": "call_9",
                "name": "weather",
                "arguments": "{\"city\":\"Rome\"}"
            }]
        }));
        assert_eq!(dto.status, "requires_action");
        assert_eq!(dto.conversation_id.as_deref(), Some("conv_7"));
        assert_eq!(dto.tool_calls[0].id, "call_9");
        assert_eq!(dto.tool_calls[0].arguments, json!({"city": "Rome"}));

        let flat = ResponseApiAdapter.transform_response(&json!({
            "conversation_id": "conv_8",
            "tool_calls": [{"id": "t1", "name": "missing", "arguments": {}}]
        }));
        assert_eq!(flat.conversation_id.as_deref(), Some("conv_8"));
        assert_eq!(flat.tool_calls[0].name, "missing");
        assert_eq!(flat.status, "completed");
    }
}
