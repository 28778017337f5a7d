//! Audio adapters: whisper transcription/translation and text-to-speech.

use super::files::AUDIO_FILE_RULES;
use super::{check_file, invalid, str_field, EndpointAdapter, EndpointRequest, FileValidator};
use crate::endpoint::Endpoint;
use crate::types::{AudioConfig, ResponseDto, ResponseType, UnifiedRequest};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_SPEECH_FORMAT: &str = "mp3";
pub const MAX_SPEECH_INPUT_CHARS: usize = 4096;

const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
const SPEECH_FORMATS: &[&str] = &["mp3", "opus", "aac", "flac", "wav", "pcm"];
const WHISPER_FORMATS: &[&str] = &["json", "text", "srt", "verbose_json", "vtt"];

fn audio_of<'a>(request: &'a UnifiedRequest, source: &str) -> Result<&'a AudioConfig> {
    request
        .audio
        .as_ref()
        .ok_or_else(|| invalid("audio configuration is required", "audio", source))
}

/// Shared whisper request building; translation drops `language`.
fn whisper_request(
    endpoint: Endpoint,
    validator: &dyn FileValidator,
    request: &UnifiedRequest,
    forward_language: bool,
) -> Result<EndpointRequest> {
    let source = endpoint.as_str();
    let audio = audio_of(request, source)?;
    let file = audio
        .file
        .as_deref()
        .ok_or_else(|| invalid("audio.file is required", "audio.file", source))?;
    check_file(validator, file, &AUDIO_FILE_RULES, "audio.file", source)?;

    let format = audio.response_format.as_deref().unwrap_or("json");
    if !WHISPER_FORMATS.contains(&format) {
        return Err(invalid(
            format!("unsupported response_format '{}'", format),
            "audio.response_format",
            source,
        ));
    }

    let mut out = EndpointRequest::new(endpoint);
    out.set_file("file", file);
    out.set(
        "model",
        audio.model.as_deref().unwrap_or(DEFAULT_WHISPER_MODEL),
    );
    out.set("response_format", format);
    match audio.temperature {
        Some(t) if !(0.0..=1.0).contains(&t) => {
            return Err(invalid(
                "temperature must be between 0 and 1",
                "audio.temperature",
                source,
            ))
        }
        Some(t) => out.set("temperature", t),
        None => out.set("temperature", 0),
    }
    if forward_language {
        out.set_opt("language", audio.language.clone());
    }
    out.set_opt("prompt", audio.prompt.clone());
    out.idempotency_key = request.idempotency_key.clone();
    Ok(out)
}

fn whisper_response(response_type: ResponseType, raw: &Value) -> ResponseDto {
    let mut dto = ResponseDto::new(response_type, raw.clone());
    // text/srt/vtt formats come back as a bare string
    dto.text = match raw {
        Value::String(s) => Some(s.clone()),
        other => str_field(other, "text"),
    };
    for key in ["duration", "language", "segments", "words", "task"] {
        dto.copy_meta(raw, key);
    }
    dto
}

#[derive(Debug, Clone)]
pub struct TranscriptionAdapter {
    validator: Arc<dyn FileValidator>,
}

impl TranscriptionAdapter {
    pub fn new(validator: Arc<dyn FileValidator>) -> Self {
        Self { validator }
    }
}

impl EndpointAdapter for TranscriptionAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioTranscription
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        whisper_request(self.endpoint(), self.validator.as_ref(), request, true)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        whisper_response(ResponseType::AudioTranscription, response)
    }
}

#[derive(Debug, Clone)]
pub struct TranslationAdapter {
    validator: Arc<dyn FileValidator>,
}

impl TranslationAdapter {
    pub fn new(validator: Arc<dyn FileValidator>) -> Self {
        Self { validator }
    }
}

impl EndpointAdapter for TranslationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioTranslation
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        whisper_request(self.endpoint(), self.validator.as_ref(), request, false)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        whisper_response(ResponseType::AudioTranslation, response)
    }
}

/// Text-to-speech. The transport returns the audio bytes base64 encoded under `audio`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeechAdapter;

impl EndpointAdapter for SpeechAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioSpeech
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let source = self.endpoint().as_str();
        let audio = audio_of(request, source)?;
        let input = audio
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| invalid("audio.text is required for speech", "audio.text", source))?;
        if input.chars().count() > MAX_SPEECH_INPUT_CHARS {
            return Err(invalid(
                format!("speech input exceeds {} characters", MAX_SPEECH_INPUT_CHARS),
                "audio.text",
                source,
            ));
        }

        let voice = audio.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        if !VOICES.contains(&voice) {
            return Err(invalid(
                format!("unknown voice '{}' (expected one of: {})", voice, VOICES.join(", ")),
                "audio.voice",
                source,
            ));
        }
        let speed = audio.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(invalid(
                "speed must be between 0.25 and 4.0",
                "audio.speed",
                source,
            ));
        }
        let format = audio
            .response_format
            .as_deref()
            .unwrap_or(DEFAULT_SPEECH_FORMAT);
        if !SPEECH_FORMATS.contains(&format) {
            return Err(invalid(
                format!("unsupported response_format '{}'", format),
                "audio.response_format",
                source,
            ));
        }

        let mut out = EndpointRequest::new(self.endpoint());
        out.set("model", audio.model.as_deref().unwrap_or(DEFAULT_TTS_MODEL));
        out.set("input", input);
        out.set("voice", voice);
        out.set("speed", speed);
        out.set("response_format", format);
        out.idempotency_key = request.idempotency_key.clone();
        Ok(out)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        let mut dto = ResponseDto::new(ResponseType::AudioSpeech, response.clone());
        dto.audio_content = str_field(response, "audio");
        for key in ["voice", "model", "format", "content_type"] {
            dto.copy_meta(response, key);
        }
        if !dto.metadata.contains_key("format") {
            if let Some(f) = response.get("response_format").filter(|v| !v.is_null()) {
                dto.metadata.insert("format".into(), f.clone());
            }
        }
        dto
    }
}

/// Speech payload as produced by the HTTP transport.
pub(crate) fn speech_payload(audio_b64: String, request: &EndpointRequest) -> Value {
    json!({
        "audio": audio_b64,
        "format": request.get("response_format").cloned().unwrap_or(Value::Null),
        "voice": request.get("voice").cloned().unwrap_or(Value::Null),
        "model": request.get("model").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FileErrorKind, FileRules, FileValidationError};
    use crate::Error;
    use std::path::Path;

    #[derive(Debug)]
    struct AcceptAll;

    impl FileValidator for AcceptAll {
        fn validate(&self, _: &Path, _: &FileRules) -> std::result::Result<(), FileValidationError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Missing;

    impl FileValidator for Missing {
        fn validate(&self, p: &Path, _: &FileRules) -> std::result::Result<(), FileValidationError> {
            Err(FileValidationError::new(
                FileErrorKind::NotFound,
                format!("{} missing", p.display()),
            ))
        }
    }

    #[test]
    fn transcription_end_to_end() {
        let adapter = TranscriptionAdapter::new(Arc::new(AcceptAll));
        let req = UnifiedRequest::new().with_audio(AudioConfig::transcribe("a.mp3"));
        let out = adapter.transform_request(&req).unwrap();
        assert_eq!(
            out.body(),
            json!({"file": "a.mp3", "model": "whisper-1", "response_format": "json", "temperature": 0})
        );
        assert!(out.is_file_field("file"));
        assert_eq!(adapter.transform_request(&req).unwrap(), out);

        let dto = adapter.transform_response(&json!({"text": "hi", "duration": 1.2, "language": "en"}));
        assert_eq!(dto.response_type, ResponseType::AudioTranscription);
        assert_eq!(dto.text.as_deref(), Some("hi"));
        assert_eq!(dto.meta("duration"), Some(&json!(1.2)));
        assert_eq!(dto.meta("language"), Some(&json!("en")));
        assert_eq!(dto.status, "completed");
    }

    #[test]
    fn translation_drops_language() {
        let adapter = TranslationAdapter::new(Arc::new(AcceptAll));
        let req = UnifiedRequest::new().with_audio(
            AudioConfig::translate("a.wav").language("de").prompt("names: Jürgen"),
        );
        let out = adapter.transform_request(&req).unwrap();
        assert!(out.get("language").is_none());
        assert_eq!(out.get("prompt"), Some(&json!("names: Jürgen")));
    }

    #[test]
    fn file_errors_become_validation_errors() {
        let adapter = TranscriptionAdapter::new(Arc::new(Missing));
        let req = UnifiedRequest::new().with_audio(AudioConfig::transcribe("gone.mp3"));
        match adapter.transform_request(&req) {
            Err(Error::Validation { context, .. }) => {
                assert_eq!(context.field_path.as_deref(), Some("audio.file"));
                assert!(context.details.unwrap().contains("not_found"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let no_file = UnifiedRequest::new().with_audio(AudioConfig {
            action: Some(crate::types::AudioAction::Transcribe),
            ..Default::default()
        });
        assert!(matches!(
            TranscriptionAdapter::new(Arc::new(AcceptAll)).transform_request(&no_file),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn speech_defaults_and_limits() {
        let out = SpeechAdapter
            .transform_request(&UnifiedRequest::new().with_audio(AudioConfig::speech("hello")))
            .unwrap();
        assert_eq!(out.get("voice"), Some(&json!("alloy")));
        assert_eq!(out.get("model"), Some(&json!("tts-1")));
        assert_eq!(out.get("response_format"), Some(&json!("mp3")));
        assert_eq!(out.get("speed").and_then(|v| v.as_f64()), Some(1.0));

        let bad_voice = UnifiedRequest::new().with_audio(AudioConfig::speech("x").voice("robot"));
        assert!(SpeechAdapter.transform_request(&bad_voice).is_err());
        let bad_speed = UnifiedRequest::new().with_audio(AudioConfig::speech("x").speed(5.0));
        assert!(SpeechAdapter.transform_request(&bad_speed).is_err());
        let long = UnifiedRequest::new().with_audio(AudioConfig::speech("a".repeat(4097)));
        assert!(SpeechAdapter.transform_request(&long).is_err());
    }

    #[test]
    fn speech_response_keeps_voice() {
        let dto = SpeechAdapter.transform_response(&json!({
            "audio": "AAAA", "format": "mp3", "voice": "nova", "model": "tts-1"
        }));
        assert_eq!(dto.audio_content.as_deref(), Some("AAAA"));
        assert_eq!(dto.meta("voice"), Some(&json!("nova")));
        assert!(dto.text.is_none());
    }
}
