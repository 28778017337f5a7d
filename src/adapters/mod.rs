//! 端点适配器：在统一请求/响应与各端点的线协议格式之间转换。
//!
//! # Endpoint Adapters
//!
//! One stateless adapter per [`Endpoint`]. Adapters are pure transformers:
//!
//! - [`EndpointAdapter::transform_request`] validates the unified request and builds the
//!   endpoint payload, failing with [`Error::Validation`] on missing or malformed input.
//! - [`EndpointAdapter::transform_response`] never fails: absent or unexpected fields
//!   degrade to `None` and the untouched payload is kept in [`ResponseDto::raw`].
//!
//! | Adapter | Endpoint |
//! |---------|----------|
//! | [`TranscriptionAdapter`] | `/v1/audio/transcriptions` |
//! | [`TranslationAdapter`] | `/v1/audio/translations` |
//! | [`SpeechAdapter`] | `/v1/audio/speech` |
//! | [`ImageGenerationAdapter`] | `/v1/images/generations` |
//! | [`ImageEditAdapter`] | `/v1/images/edits` |
//! | [`ImageVariationAdapter`] | `/v1/images/variations` |
//! | [`ChatCompletionAdapter`] | `/v1/chat/completions` |
//! | [`ResponseApiAdapter`] | `/v1/responses` |

mod audio;
mod chat;
mod factory;
pub mod files;
mod image;
mod responses;

pub use audio::{SpeechAdapter, TranscriptionAdapter, TranslationAdapter};
pub(crate) use audio::speech_payload;
pub use chat::ChatCompletionAdapter;
pub use factory::AdapterFactory;
pub use files::{FileErrorKind, FileRules, FileValidationError, FileValidator, FsFileValidator};
pub use image::{ImageEditAdapter, ImageGenerationAdapter, ImageVariationAdapter};
pub use responses::ResponseApiAdapter;

use crate::endpoint::Endpoint;
use crate::types::{ResponseDto, UnifiedRequest};
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Endpoint-specific request produced by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointRequest {
    pub endpoint: Endpoint,
    pub payload: Map<String, Value>,
    /// Payload keys whose values are local file paths to upload.
    pub file_fields: Vec<String>,
    pub stream: bool,
    pub idempotency_key: Option<String>,
}

impl EndpointRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            payload: Map::new(),
            file_fields: Vec::new(),
            stream: false,
            idempotency_key: None,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.payload.insert(key.to_string(), value.into());
    }

    /// Set only when a value is present; absent optional fields are omitted, never null.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    pub fn set_file(&mut self, key: &str, path: &Path) {
        self.set(key, path.to_string_lossy().into_owned());
        self.file_fields.push(key.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn file_path(&self, key: &str) -> Option<PathBuf> {
        self.payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
    }

    pub fn is_file_field(&self, key: &str) -> bool {
        self.file_fields.iter().any(|f| f == key)
    }

    /// Payload as a JSON object.
    pub fn body(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}

/// Translates between the unified shapes and one endpoint's wire format.
pub trait EndpointAdapter: Send + Sync + std::fmt::Debug {
    fn endpoint(&self) -> Endpoint;

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest>;

    fn transform_response(&self, response: &Value) -> ResponseDto;
}

pub(crate) fn invalid(
    message: impl Into<String>,
    field: &str,
    source: &str,
) -> Error {
    Error::validation_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source(source),
    )
}

pub(crate) fn check_file(
    validator: &dyn FileValidator,
    path: &Path,
    rules: &FileRules,
    field: &str,
    source: &str,
) -> Result<()> {
    validator.validate(path, rules).map_err(|e| {
        Error::validation_with_context(
            e.message,
            ErrorContext::new()
                .with_field_path(field)
                .with_details(format!("kind: {}", e.kind.as_str()))
                .with_source(source),
        )
    })
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
