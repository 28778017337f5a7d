//! Unified request format consumed by the router and the adapters.

use super::conversation::ConversationItem;
use super::tool::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// What the caller wants done with audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioAction {
    #[serde(alias = "transcription")]
    Transcribe,
    #[serde(alias = "translation")]
    Translate,
    #[serde(alias = "speak", alias = "tts")]
    Speech,
}

/// Audio sub-object of a unified request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AudioAction>,
    /// Local audio file for transcription/translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Text to synthesize for speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl AudioConfig {
    pub fn transcribe(file: impl Into<PathBuf>) -> Self {
        Self {
            action: Some(AudioAction::Transcribe),
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn translate(file: impl Into<PathBuf>) -> Self {
        Self {
            action: Some(AudioAction::Translate),
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn speech(text: impl Into<String>) -> Self {
        Self {
            action: Some(AudioAction::Speech),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Action after applying the implicit rules: a file means transcription, text means speech.
    pub fn effective_action(&self) -> Option<AudioAction> {
        self.action.or_else(|| {
            if self.file.is_some() {
                Some(AudioAction::Transcribe)
            } else if self.text.is_some() {
                Some(AudioAction::Speech)
            } else {
                None
            }
        })
    }
}

/// Image sub-object of a unified request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Source image for edits and variations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ImageConfig {
    pub fn generate(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn edit(image: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn variation(image: impl Into<PathBuf>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }

    pub fn mask(mut self, mask: impl Into<PathBuf>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }
}

/// Unified request: at most one of `text`, `audio`, `image` should be populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,
    /// Explicit chat-style message list; selects the chat completion endpoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ConversationItem>,
    /// Accumulated conversation input (user items, tool calls, tool results).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<ConversationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// OpenAI-style tool choice: "auto", "none", "required" or an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Explicit endpoint name, bypassing predicate routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    /// `Some(false)` opts out of the automatic `file_search` tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_file_search: Option<bool>,
    #[serde(default)]
    pub stream: bool,
}

impl UnifiedRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_image(mut self, image: ImageConfig) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Whether a text-family payload is present (text, chat messages or conversation input).
    pub fn has_text(&self) -> bool {
        self.text.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
            || !self.messages.is_empty()
            || !self.input.is_empty()
    }

    /// Number of populated top-level modality keys among text, audio and image.
    pub fn populated_modalities(&self) -> usize {
        [self.has_text(), self.audio.is_some(), self.image.is_some()]
            .iter()
            .filter(|b| **b)
            .count()
    }

    /// File ids from `file_ids` plus any attachment carrying a `file_id`, deduplicated.
    pub fn attached_file_ids(&self) -> Vec<String> {
        let mut ids = self.file_ids.clone();
        for id in self
            .attachments
            .iter()
            .filter_map(|a| a.get("file_id").and_then(|v| v.as_str()))
        {
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }

    /// Whether attachments should pull in a `file_search` tool declaration.
    pub fn wants_file_search(&self) -> bool {
        (!self.file_ids.is_empty() || !self.attachments.is_empty())
            && self.use_file_search != Some(false)
    }
}
