//! Tool calling definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool declaration sent to the provider.
///
/// Function tools carry a [`FunctionDefinition`]; hosted tools such as `file_search`
/// only carry a type plus free-form options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDefinition>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: Some(FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            }),
            options: Map::new(),
        }
    }

    pub fn file_search() -> Self {
        Self {
            tool_type: "file_search".to_string(),
            function: None,
            options: Map::new(),
        }
    }

    /// Function name for function tools, the tool type otherwise.
    pub fn name(&self) -> &str {
        self.function
            .as_ref()
            .map(|f| f.name.as_str())
            .unwrap_or(self.tool_type.as_str())
    }

    pub fn parameters(&self) -> Option<&Value> {
        self.function.as_ref().and_then(|f| f.parameters.as_ref())
    }
}

/// Tool call (invocation requested by the model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Providers send arguments as a JSON-encoded string; decode it when possible and keep
    /// the raw string otherwise.
    pub fn decode_arguments(raw: Option<&Value>) -> Value {
        match raw {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Object(Map::new())
                } else {
                    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(s.clone()))
                }
            }
            Some(v) => v.clone(),
            None => Value::Object(Map::new()),
        }
    }

    /// Arguments re-encoded as the string providers expect on the wire.
    pub fn arguments_string(&self) -> String {
        match &self.arguments {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_search_serializes_flat() {
        let v = serde_json::to_value(ToolDefinition::file_search()).unwrap();
        assert_eq!(v, json!({"type": "file_search"}));
    }

    #[test]
    fn decodes_string_arguments() {
        let raw = json!("{\"city\":\"Paris\"}");
        assert_eq!(ToolCall::decode_arguments(Some(&raw)), json!({"city": "Paris"}));
        let broken = json!("{\"city\":");
        assert_eq!(ToolCall::decode_arguments(Some(&broken)), broken);
        assert_eq!(ToolCall::decode_arguments(None), json!({}));
    }
}
