use crate::endpoint::Endpoint;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "audio.file", "image.size")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected values, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "audio_transcription_adapter", "request_router")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the turn runtime.
///
/// Tool failures are deliberately absent from the runtime path: a missing tool or a
/// tool raising is encoded into an error-tagged `tool_result` and the turn continues.
/// `Error::Tool` only covers registration problems (bad schema, duplicate name).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Endpoint conflict: {message} (candidates: {})", format_candidates(.candidates))]
    Conflict {
        message: String,
        candidates: Vec<Endpoint>,
    },

    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("Remote error: HTTP {status} ({class}): {message}")]
    Remote {
        status: u16,
        class: String,
        message: String,
        retryable: bool,
        retry_after_ms: Option<u32>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Stream canceled by provider{}", .response_id.as_ref().map(|id| format!(" (response: {})", id)).unwrap_or_default())]
    Cancelled { response_id: Option<String> },

    #[error("Tool-calling loop exceeded {max_rounds} rounds without a final response")]
    MaxToolRounds { max_rounds: u32 },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_candidates(candidates: &[Endpoint]) -> String {
    candidates
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// HTTP statuses that are worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

static TRANSIENT_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(connection (refused|reset|closed|aborted)|broken pipe|timed? ?out|timeout|rate.?limit|too many requests|temporarily unavailable|overloaded)",
    )
    .expect("static regex")
});

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Build a remote error from an HTTP status, classifying it for retry.
    pub fn remote(status: u16, message: impl Into<String>, retry_after_ms: Option<u32>) -> Self {
        Error::Remote {
            status,
            class: status_class(status).to_string(),
            message: message.into(),
            retryable: RETRYABLE_STATUSES.contains(&status),
            retry_after_ms,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether a fresh attempt of the same provider call may succeed.
    ///
    /// Status membership decides for remote errors; transport and runtime errors are
    /// matched against connection, timeout and rate-limit signatures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Remote {
                status, retryable, ..
            } => *retryable || RETRYABLE_STATUSES.contains(status),
            Error::Transport(e) => match e {
                crate::transport::TransportError::Http(inner) => {
                    inner.is_timeout()
                        || inner.is_connect()
                        || TRANSIENT_SIGNATURE.is_match(&inner.to_string())
                }
                crate::transport::TransportError::Other(msg) => TRANSIENT_SIGNATURE.is_match(msg),
            },
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionRefused
            ),
            Error::Runtime { message, .. } => TRANSIENT_SIGNATURE.is_match(message),
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after_ms(&self) -> Option<u32> {
        match self {
            Error::Remote { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        400 => "invalid_request",
        401 => "authentication",
        403 => "permission_denied",
        404 => "not_found",
        408 => "timeout",
        409 => "conflict",
        413 => "request_too_large",
        425 => "too_early",
        429 => "rate_limited",
        500 | 502 => "server_error",
        503 => "overloaded",
        504 => "timeout",
        _ => "http_error",
    }
}
