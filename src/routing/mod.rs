//! 端点路由：检查统一请求并选出唯一的端点，或在模态冲突时失败。
//!
//! Endpoint routing.
//!
//! The router is pure logic: it walks a configurable priority list, asks each
//! endpoint's predicate whether the request targets it, and picks the first match.
//! Matches spanning more than one modality family (text, audio, image) are a
//! conflict, handled according to [`ConflictBehavior`].
//!
//! The router holds no mutable state and can be shared across concurrent turns.

use crate::endpoint::{Endpoint, Modality};
use crate::types::{AudioAction, UnifiedRequest};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// What to do when a request matches endpoints from more than one modality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    /// Fail with [`Error::Conflict`].
    #[default]
    Error,
    /// Log a warning and proceed with the highest-priority match.
    Warn,
    /// Proceed with the highest-priority match without logging.
    Silent,
}

impl std::str::FromStr for ConflictBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "fail" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "silent" | "ignore" => Ok(Self::Silent),
            other => Err(Error::configuration_with_context(
                format!("unknown conflict behavior '{}'", other),
                ErrorContext::new()
                    .with_field_path("router.conflict_behavior")
                    .with_details("expected one of: error, warn, silent"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub priority: Vec<Endpoint>,
    pub validate_conflicts: bool,
    pub conflict_behavior: ConflictBehavior,
    pub validate_endpoint_names: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            priority: Endpoint::ALL.to_vec(),
            validate_conflicts: true,
            conflict_behavior: ConflictBehavior::Error,
            validate_endpoint_names: true,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.priority.is_empty() {
            return Err(Error::configuration_with_context(
                "router priority list must not be empty",
                ErrorContext::new().with_field_path("router.priority"),
            ));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.priority {
            if !seen.insert(*endpoint) {
                return Err(Error::configuration_with_context(
                    format!("endpoint '{}' listed twice in router priority", endpoint),
                    ErrorContext::new().with_field_path("router.priority"),
                ));
            }
        }
        Ok(())
    }
}

/// Stateless endpoint router.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    config: RouterConfig,
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self {
            config: RouterConfig::default(),
        }
    }
}

impl RequestRouter {
    pub fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Predicate deciding whether `request` targets `endpoint`.
    pub fn matches(endpoint: Endpoint, request: &UnifiedRequest) -> bool {
        let audio_action = request.audio.as_ref().and_then(|a| a.effective_action());
        let image = request.image.as_ref();
        match endpoint {
            Endpoint::AudioTranscription => audio_action == Some(AudioAction::Transcribe),
            Endpoint::AudioTranslation => audio_action == Some(AudioAction::Translate),
            Endpoint::AudioSpeech => audio_action == Some(AudioAction::Speech),
            Endpoint::ImageGeneration => image.map(|i| i.image.is_none()).unwrap_or(false),
            Endpoint::ImageEdit => image
                .map(|i| i.image.is_some() && (i.mask.is_some() || i.prompt.is_some()))
                .unwrap_or(false),
            Endpoint::ImageVariation => image
                .map(|i| i.image.is_some() && i.mask.is_none() && i.prompt.is_none())
                .unwrap_or(false),
            Endpoint::ChatCompletion => !request.messages.is_empty(),
            Endpoint::ResponseApi => {
                request.text.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
                    || !request.input.is_empty()
            }
        }
    }

    /// All matching endpoints in priority order.
    pub fn candidates(&self, request: &UnifiedRequest) -> Vec<Endpoint> {
        self.config
            .priority
            .iter()
            .copied()
            .filter(|e| Self::matches(*e, request))
            .collect()
    }

    /// Pick exactly one endpoint for `request`.
    pub fn determine_endpoint(&self, request: &UnifiedRequest) -> Result<Endpoint> {
        if let Some(name) = request.endpoint.as_deref() {
            match name.parse::<Endpoint>() {
                Ok(endpoint) => {
                    debug!(endpoint = endpoint.as_str(), "explicit endpoint requested");
                    return Ok(endpoint);
                }
                Err(e) if self.config.validate_endpoint_names => return Err(e),
                Err(_) => {
                    debug!(endpoint = name, "ignoring unknown endpoint name");
                }
            }
        }

        let candidates = self.candidates(request);
        let Some(winner) = candidates.first().copied() else {
            return Err(Error::validation_with_context(
                "request does not target any endpoint",
                ErrorContext::new()
                    .with_details("populate one of: text, messages, input, audio, image")
                    .with_source("request_router"),
            ));
        };

        if self.config.validate_conflicts {
            let families: HashSet<Modality> = candidates.iter().map(|e| e.modality()).collect();
            if families.len() > 1 || request.populated_modalities() > 1 {
                let message = format!(
                    "request populates {} modalities; '{}' has the highest priority",
                    request.populated_modalities().max(families.len()),
                    winner
                );
                match self.config.conflict_behavior {
                    ConflictBehavior::Error => {
                        return Err(Error::Conflict {
                            message,
                            candidates,
                        })
                    }
                    ConflictBehavior::Warn => {
                        warn!(endpoint = winner.as_str(), candidates = ?candidates, "{}", message)
                    }
                    ConflictBehavior::Silent => {}
                }
            }
        }

        debug!(endpoint = winner.as_str(), "routed request");
        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioConfig, ConversationItem, ImageConfig};

    fn router(behavior: ConflictBehavior) -> RequestRouter {
        RequestRouter::new(RouterConfig {
            conflict_behavior: behavior,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn single_modality_routes_deterministically() {
        let r = RequestRouter::default();
        let cases = vec![
            (
                UnifiedRequest::new().with_audio(AudioConfig::transcribe("a.mp3")),
                Endpoint::AudioTranscription,
            ),
            (
                UnifiedRequest::new().with_audio(AudioConfig::translate("a.mp3")),
                Endpoint::AudioTranslation,
            ),
            (
                UnifiedRequest::new().with_audio(AudioConfig::speech("hi")),
                Endpoint::AudioSpeech,
            ),
            (
                UnifiedRequest::new().with_image(ImageConfig::generate("a cat")),
                Endpoint::ImageGeneration,
            ),
            (
                UnifiedRequest::new().with_image(ImageConfig::edit("a.png", "add a hat")),
                Endpoint::ImageEdit,
            ),
            (
                UnifiedRequest::new().with_image(ImageConfig::variation("a.png").mask("m.png")),
                Endpoint::ImageEdit,
            ),
            (
                UnifiedRequest::new().with_image(ImageConfig::variation("a.png")),
                Endpoint::ImageVariation,
            ),
            (UnifiedRequest::text("hello"), Endpoint::ResponseApi),
        ];
        for (req, expected) in cases {
            assert_eq!(r.determine_endpoint(&req).unwrap(), expected);
            assert_eq!(r.determine_endpoint(&req).unwrap(), expected);
        }
    }

    #[test]
    fn chat_messages_win_over_responses_within_text_family() {
        let mut req = UnifiedRequest::text("hello");
        req.messages.push(ConversationItem::user("hello"));
        let r = RequestRouter::default();
        assert_eq!(r.determine_endpoint(&req).unwrap(), Endpoint::ChatCompletion);
    }

    #[test]
    fn conflicting_modalities() {
        let req = UnifiedRequest::text("describe")
            .with_audio(AudioConfig::speech("hi"))
            .with_image(ImageConfig::generate("a cat"));

        match router(ConflictBehavior::Error).determine_endpoint(&req) {
            Err(Error::Conflict { candidates, .. }) => {
                assert_eq!(
                    candidates,
                    vec![
                        Endpoint::AudioSpeech,
                        Endpoint::ImageGeneration,
                        Endpoint::ResponseApi
                    ]
                );
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(
            router(ConflictBehavior::Warn).determine_endpoint(&req).unwrap(),
            Endpoint::AudioSpeech
        );
        assert_eq!(
            router(ConflictBehavior::Silent).determine_endpoint(&req).unwrap(),
            Endpoint::AudioSpeech
        );
    }

    #[test]
    fn conflicts_can_be_disabled() {
        let req = UnifiedRequest::text("x").with_image(ImageConfig::generate("y"));
        let r = RequestRouter::new(RouterConfig {
            validate_conflicts: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(r.determine_endpoint(&req).unwrap(), Endpoint::ImageGeneration);
    }

    #[test]
    fn custom_priority_changes_winner() {
        let req = UnifiedRequest::text("x").with_image(ImageConfig::generate("y"));
        let r = RequestRouter::new(RouterConfig {
            priority: vec![Endpoint::ResponseApi, Endpoint::ImageGeneration],
            conflict_behavior: ConflictBehavior::Silent,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(r.determine_endpoint(&req).unwrap(), Endpoint::ResponseApi);
    }

    #[test]
    fn explicit_endpoint_names() {
        let mut req = UnifiedRequest::text("x");
        req.endpoint = Some("chat-completion".into());
        assert_eq!(
            RequestRouter::default().determine_endpoint(&req).unwrap(),
            Endpoint::ChatCompletion
        );

        req.endpoint = Some("video".into());
        assert!(matches!(
            RequestRouter::default().determine_endpoint(&req),
            Err(Error::Validation { .. })
        ));

        let lenient = RequestRouter::new(RouterConfig {
            validate_endpoint_names: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(lenient.determine_endpoint(&req).unwrap(), Endpoint::ResponseApi);
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(
            RequestRouter::default().determine_endpoint(&UnifiedRequest::new()),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn duplicate_priority_is_a_configuration_error() {
        let cfg = RouterConfig {
            priority: vec![Endpoint::ResponseApi, Endpoint::ResponseApi],
            ..Default::default()
        };
        assert!(matches!(
            RequestRouter::new(cfg),
            Err(Error::Configuration { .. })
        ));
    }
}
