//! Closed set of provider endpoints a turn can be served by.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One concrete provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    AudioTranscription,
    AudioTranslation,
    AudioSpeech,
    ImageGeneration,
    ImageEdit,
    ImageVariation,
    ChatCompletion,
    ResponseApi,
}

/// Top-level modality family of an endpoint. Conflicts are detected across families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Text,
    Audio,
    Image,
}

impl Endpoint {
    /// Default routing priority.
    pub const ALL: [Endpoint; 8] = [
        Endpoint::AudioTranscription,
        Endpoint::AudioTranslation,
        Endpoint::AudioSpeech,
        Endpoint::ImageGeneration,
        Endpoint::ImageEdit,
        Endpoint::ImageVariation,
        Endpoint::ChatCompletion,
        Endpoint::ResponseApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioTranscription => "audio_transcription",
            Self::AudioTranslation => "audio_translation",
            Self::AudioSpeech => "audio_speech",
            Self::ImageGeneration => "image_generation",
            Self::ImageEdit => "image_edit",
            Self::ImageVariation => "image_variation",
            Self::ChatCompletion => "chat_completion",
            Self::ResponseApi => "response_api",
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Self::AudioTranscription | Self::AudioTranslation | Self::AudioSpeech => {
                Modality::Audio
            }
            Self::ImageGeneration | Self::ImageEdit | Self::ImageVariation => Modality::Image,
            Self::ChatCompletion | Self::ResponseApi => Modality::Text,
        }
    }

    /// Provider path (OpenAI layout).
    pub fn path(&self) -> &'static str {
        match self {
            Self::AudioTranscription => "/v1/audio/transcriptions",
            Self::AudioTranslation => "/v1/audio/translations",
            Self::AudioSpeech => "/v1/audio/speech",
            Self::ImageGeneration => "/v1/images/generations",
            Self::ImageEdit => "/v1/images/edits",
            Self::ImageVariation => "/v1/images/variations",
            Self::ChatCompletion => "/v1/chat/completions",
            Self::ResponseApi => "/v1/responses",
        }
    }

    /// Whether the provider expects a multipart upload rather than a JSON body.
    pub fn is_multipart(&self) -> bool {
        matches!(
            self,
            Self::AudioTranscription
                | Self::AudioTranslation
                | Self::ImageEdit
                | Self::ImageVariation
        )
    }

    /// Whether the endpoint can emit a server-sent event stream.
    pub fn supports_streaming(&self) -> bool {
        matches!(self, Self::ChatCompletion | Self::ResponseApi)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = crate::Error;

    /// Accepts snake_case names plus the kebab-case spellings used in configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let endpoint = match normalized.as_str() {
            "audio_transcription" | "transcription" => Self::AudioTranscription,
            "audio_translation" | "translation" => Self::AudioTranslation,
            "audio_speech" | "speech" => Self::AudioSpeech,
            "image_generation" => Self::ImageGeneration,
            "image_edit" => Self::ImageEdit,
            "image_variation" => Self::ImageVariation,
            "chat_completion" | "chat" => Self::ChatCompletion,
            "response_api" | "responses" | "response" => Self::ResponseApi,
            _ => {
                return Err(crate::Error::validation_with_context(
                    format!("unknown endpoint '{}'", s),
                    crate::ErrorContext::new()
                        .with_field_path("endpoint")
                        .with_source("endpoint"),
                ))
            }
        };
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_and_snake() {
        assert_eq!(
            "audio-transcription".parse::<Endpoint>().unwrap(),
            Endpoint::AudioTranscription
        );
        assert_eq!("response_api".parse::<Endpoint>().unwrap(), Endpoint::ResponseApi);
        assert!("video-generation".parse::<Endpoint>().is_err());
    }

    #[test]
    fn modality_families() {
        assert_eq!(Endpoint::ImageEdit.modality(), Modality::Image);
        assert_eq!(Endpoint::AudioSpeech.modality(), Modality::Audio);
        assert_eq!(Endpoint::ChatCompletion.modality(), Modality::Text);
    }
}
