//! Chat completions adapter.

use super::{invalid, str_field, EndpointAdapter, EndpointRequest};
use crate::endpoint::Endpoint;
use crate::types::{
    ConversationItem, ItemType, ResponseDto, ResponseType, Role, ToolCall, UnifiedRequest,
};
use crate::Result;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletionAdapter;

/// Append one conversation item in chat wire format. Consecutive tool calls share one
/// assistant message.
fn push_item(messages: &mut Vec<Value>, item: &ConversationItem) {
    match item.item_type {
        ItemType::Message => {
            let role = item.role.unwrap_or(Role::User);
            messages.push(json!({"role": role.as_str(), "content": item.text()}));
        }
        ItemType::ToolCall => {
            let call = json!({
                "id": item.tool_call_id.clone().unwrap_or_default(),
                "type": "function",
                "function": {
                    "name": item.name.clone().unwrap_or_default(),
                    "arguments": match &item.arguments {
                        Some(Value::String(s)) => s.clone(),
                        Some(v) => v.to_string(),
                        None => "{}".to_string(),
                    },
                },
            });
            if let Some(calls) = messages
                .last_mut()
                .filter(|m| m["role"] == "assistant" && m["content"].is_null())
                .and_then(|m| m.get_mut("tool_calls"))
                .and_then(|c| c.as_array_mut())
            {
                calls.push(call);
                return;
            }
            messages.push(json!({"role": "assistant", "content": null, "tool_calls": [call]}));
        }
        ItemType::ToolResult => {
            messages.push(json!({
                "role": "tool",
                "tool_call_id": item.tool_call_id.clone().unwrap_or_default(),
                "content": item.text(),
            }));
        }
    }
}

pub(crate) fn parse_chat_tool_calls(calls: Option<&Value>) -> Vec<ToolCall> {
    calls
        .and_then(|c| c.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let id = str_field(c, "id")?;
                    let function = c.get("function")?;
                    let name = str_field(function, "name")?;
                    Some(ToolCall::new(
                        id,
                        name,
                        ToolCall::decode_arguments(function.get("arguments")),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl EndpointAdapter for ChatCompletionAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ChatCompletion
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let mut messages = Vec::new();
        if let Some(instructions) = request.instructions.as_deref() {
            messages.push(json!({"role": "system", "content": instructions}));
        }
        for item in request.messages.iter().chain(request.input.iter()) {
            push_item(&mut messages, item);
        }
        if let Some(text) = request.text.as_deref().filter(|t| !t.is_empty()) {
            messages.push(json!({"role": "user", "content": text}));
        }
        if messages.is_empty() {
            return Err(invalid(
                "chat completion needs at least one message",
                "messages",
                self.endpoint().as_str(),
            ));
        }

        let mut out = EndpointRequest::new(self.endpoint());
        out.set(
            "model",
            request.model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL),
        );
        out.set("messages", messages);
        out.set_opt("temperature", request.temperature);

        let tools: Vec<Value> = request
            .tools
            .iter()
            .filter(|t| {
                let keep = t.function.is_some();
                if !keep {
                    debug!(tool = t.tool_type.as_str(), "chat completions only accept function tools");
                }
                keep
            })
            .filter_map(|t| serde_json::to_value(t).ok())
            .collect();
        if !tools.is_empty() {
            out.set("tools", tools);
            out.set_opt("tool_choice", request.tool_choice.clone());
        }
        out.set_opt("response_format", request.response_format.clone());
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
        let mut dto = ResponseDto::new(ResponseType::ChatCompletion, response.clone());
        dto.id = str_field(response, "id");
        let choice = response.get("choices").and_then(|c| c.get(0));
        let message = choice.and_then(|c| c.get("message"));
        dto.text = message.and_then(|m| str_field(m, "content"));
        dto.tool_calls = parse_chat_tool_calls(message.and_then(|m| m.get("tool_calls")));
        if let Some(reason) = choice.and_then(|c| c.get("finish_reason")).filter(|v| !v.is_null()) {
            dto.metadata.insert("finish_reason".into(), reason.clone());
        }
        for key in ["model", "created", "usage", "system_fingerprint"] {
            dto.copy_meta(response, key);
        }
        dto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDefinition;

    #[test]
    fn builds_messages_with_tool_round() {
        let call_a = ToolCall::new("call_a", "weather", json!({"city": "Oslo"}));
        let call_b = ToolCall::new("call_b", "time", json!({}));
        let req = UnifiedRequest {
            instructions: Some("be brief".into()),
            messages: vec![ConversationItem::user("weather and time?")],
            input: vec![
                ConversationItem::tool_call(&call_a),
                ConversationItem::tool_call(&call_b),
                ConversationItem::tool_result("call_a", "{\"temp\":3}"),
                ConversationItem::tool_result("call_b", "12:00"),
            ],
            tools: vec![
                ToolDefinition::function("weather", "Weather", json!({"type": "object"})),
                ToolDefinition::file_search(),
            ],
            tool_choice: Some(json!("auto")),
            ..Default::default()
        };
        let out = ChatCompletionAdapter.transform_request(&req).unwrap();
        let messages = out.get("messages").unwrap().as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{\"city\":\"Oslo\"}");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_a");
        assert_eq!(out.get("tools").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(out.get("model"), Some(&json!("gpt-4o-mini")));
        assert!(out.get("temperature").is_none());
    }

    #[test]
    fn empty_request_is_invalid() {
        assert!(ChatCompletionAdapter
            .transform_request(&UnifiedRequest::new())
            .is_err());
    }

    #[test]
    fn parses_text_and_tool_calls() {
        let dto = ChatCompletionAdapter.transform_response(&json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}
                    }]
                }
            }],
            "usage": {"total_tokens": 12}
        }));
        assert_eq!(dto.id.as_deref(), Some("chatcmpl-1"));
        assert!(dto.text.is_none());
        assert_eq!(dto.tool_calls[0].arguments, json!({"city": "Oslo"}));
        assert_eq!(dto.meta("finish_reason"), Some(&json!("tool_calls")));
        assert_eq!(dto.meta("usage"), Some(&json!({"total_tokens": 12})));
    }
}
