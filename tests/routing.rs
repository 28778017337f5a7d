//! Routing decisions and adapter purity across all endpoints.

use ai_turn::adapters::{
    AdapterFactory, EndpointAdapter, FileRules, FileValidationError, FileValidator,
};
use ai_turn::types::ConversationItem;
use ai_turn::{
    AudioConfig, ConflictBehavior, Endpoint, Error, ImageConfig, RequestRouter, RouterConfig,
    UnifiedRequest,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
struct AcceptAll;

impl FileValidator for AcceptAll {
    fn validate(&self, _: &Path, _: &FileRules) -> Result<(), FileValidationError> {
        Ok(())
    }
}

fn one_per_endpoint() -> Vec<(Endpoint, UnifiedRequest)> {
    vec![
        (
            Endpoint::AudioTranscription,
            UnifiedRequest::new().with_audio(AudioConfig::transcribe("clip.mp3")),
        ),
        (
            Endpoint::AudioTranslation,
            UnifiedRequest::new().with_audio(AudioConfig::translate("clip.mp3")),
        ),
        (
            Endpoint::AudioSpeech,
            UnifiedRequest::new().with_audio(AudioConfig::speech("hello").voice("nova")),
        ),
        (
            Endpoint::ImageGeneration,
            UnifiedRequest::new().with_image(ImageConfig::generate("a red fox")),
        ),
        (
            Endpoint::ImageEdit,
            UnifiedRequest::new().with_image(ImageConfig::edit("fox.png", "add a hat")),
        ),
        (
            Endpoint::ImageVariation,
            UnifiedRequest::new().with_image(ImageConfig::variation("fox.png")),
        ),
        (
            Endpoint::ChatCompletion,
            UnifiedRequest {
                messages: vec![ConversationItem::user("hi")],
                ..Default::default()
            },
        ),
        (Endpoint::ResponseApi, UnifiedRequest::text("hi")),
    ]
}

#[test]
fn every_single_modality_request_routes_to_its_endpoint() {
    let router = RequestRouter::default();
    for (expected, request) in one_per_endpoint() {
        assert_eq!(router.determine_endpoint(&request).unwrap(), expected);
        // Deterministic: same request, same answer.
        assert_eq!(router.determine_endpoint(&request).unwrap(), expected);
    }
}

#[test]
fn explicit_endpoint_overrides_predicates() {
    let router = RequestRouter::default();
    let mut request = UnifiedRequest::text("hi");
    request.endpoint = Some("chat-completion".into());
    assert_eq!(
        router.determine_endpoint(&request).unwrap(),
        Endpoint::ChatCompletion
    );

    request.endpoint = Some("telepathy".into());
    assert!(router.determine_endpoint(&request).is_err());

    let lenient = RequestRouter::new(RouterConfig {
        validate_endpoint_names: false,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        lenient.determine_endpoint(&request).unwrap(),
        Endpoint::ResponseApi
    );
}

#[test]
fn mixed_modalities_follow_conflict_behavior() {
    let request = UnifiedRequest::text("describe this")
        .with_image(ImageConfig::generate("a red fox"));

    let strict = RequestRouter::default();
    match strict.determine_endpoint(&request) {
        Err(Error::Conflict { candidates, .. }) => {
            assert!(candidates.contains(&Endpoint::ImageGeneration));
            assert!(candidates.contains(&Endpoint::ResponseApi));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    for behavior in [ConflictBehavior::Warn, ConflictBehavior::Silent] {
        let router = RequestRouter::new(RouterConfig {
            conflict_behavior: behavior,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            router.determine_endpoint(&request).unwrap(),
            Endpoint::ImageGeneration
        );
    }
}

#[test]
fn priority_order_picks_the_winner() {
    let request = UnifiedRequest::text("describe this")
        .with_image(ImageConfig::generate("a red fox"));
    let router = RequestRouter::new(RouterConfig {
        priority: vec![Endpoint::ResponseApi, Endpoint::ImageGeneration],
        validate_conflicts: false,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        router.determine_endpoint(&request).unwrap(),
        Endpoint::ResponseApi
    );
}

#[test]
fn empty_request_is_rejected() {
    let err = RequestRouter::default()
        .determine_endpoint(&UnifiedRequest::new())
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[test]
fn adapters_are_pure_and_cached() {
    let factory = AdapterFactory::new(Arc::new(AcceptAll));
    for (endpoint, request) in one_per_endpoint() {
        let adapter = factory.make(endpoint);
        assert_eq!(adapter.endpoint(), endpoint);
        let first = adapter.transform_request(&request).unwrap();
        let second = adapter.transform_request(&request).unwrap();
        assert_eq!(first, second, "{endpoint} transform is not idempotent");
        assert_eq!(first.endpoint, endpoint);
    }
    assert_eq!(factory.cached(), Endpoint::ALL.len());
    factory.make(Endpoint::ResponseApi);
    assert_eq!(factory.cached(), Endpoint::ALL.len());
}

#[test]
fn idempotency_key_is_carried_onto_every_endpoint_request() {
    let factory = AdapterFactory::new(Arc::new(AcceptAll));
    for (endpoint, mut request) in one_per_endpoint() {
        request.idempotency_key = Some("key-1".into());
        let out = factory.make(endpoint).transform_request(&request).unwrap();
        assert_eq!(out.idempotency_key.as_deref(), Some("key-1"), "{endpoint}");
    }
}

#[test]
fn response_transforms_tolerate_unexpected_payloads() {
    let factory = AdapterFactory::new(Arc::new(AcceptAll));
    for endpoint in Endpoint::ALL {
        let adapter = factory.make(endpoint);
        for payload in [json!({}), json!(null), json!("text"), json!({"choices": 3})] {
            let dto = adapter.transform_response(&payload);
            assert!(dto.tool_calls.is_empty());
            assert_eq!(dto.raw, payload);
        }
    }
}

#[test]
fn speech_response_echoes_request_fields() {
    let factory = AdapterFactory::new(Arc::new(AcceptAll));
    let dto = factory.make(Endpoint::AudioSpeech).transform_response(&json!({
        "audio": "AQID",
        "format": "mp3",
        "voice": "nova",
        "model": "tts-1"
    }));
    assert_eq!(dto.audio_content.as_deref(), Some("AQID"));
    assert_eq!(dto.meta("voice"), Some(&json!("nova")));
    assert_eq!(dto.meta("model"), Some(&json!("tts-1")));
    assert_eq!(dto.meta("format"), Some(&json!("mp3")));
}
