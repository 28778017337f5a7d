//! Unified response returned for every endpoint.

use super::tool::ToolCall;
use crate::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator naming the endpoint that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    AudioTranscription,
    AudioTranslation,
    AudioSpeech,
    ImageGeneration,
    ImageEdit,
    ImageVariation,
    ChatCompletion,
    Response,
}

impl From<Endpoint> for ResponseType {
    fn from(endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::AudioTranscription => Self::AudioTranscription,
            Endpoint::AudioTranslation => Self::AudioTranslation,
            Endpoint::AudioSpeech => Self::AudioSpeech,
            Endpoint::ImageGeneration => Self::ImageGeneration,
            Endpoint::ImageEdit => Self::ImageEdit,
            Endpoint::ImageVariation => Self::ImageVariation,
            Endpoint::ChatCompletion => Self::ChatCompletion,
            Endpoint::ResponseApi => Self::Response,
        }
    }
}

/// One generated image, either hosted or inline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// Unified response. Built once per provider call by an adapter.
///
/// `raw` keeps the untouched provider payload so callers can reach fields this
/// shape does not model yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDto {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 encoded audio payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageData>>,
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub raw: Value,
}

impl ResponseDto {
    pub fn new(response_type: ResponseType, raw: Value) -> Self {
        Self {
            id: None,
            status: "completed".to_string(),
            text: None,
            audio_content: None,
            images: None,
            response_type,
            metadata: Map::new(),
            tool_calls: Vec::new(),
            conversation_id: None,
            raw,
        }
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Copy `key` from `source` into metadata when present and non-null.
    pub(crate) fn copy_meta(&mut self, source: &Value, key: &str) {
        if let Some(v) = source.get(key).filter(|v| !v.is_null()) {
            self.metadata.insert(key.to_string(), v.clone());
        }
    }
}
