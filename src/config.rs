//! Runtime configuration.
//!
//! Everything is resolved once, at orchestrator construction. YAML files and
//! environment overrides are both supported:
//!
//! ```yaml
//! router:
//!   conflict_behavior: warn
//! retry:
//!   max_retries: 5
//! max_tool_rounds: 4
//! tool_execution: deferred_wait
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_TURN_MAX_RETRIES` | `retry.max_retries` |
//! | `AI_TURN_MAX_TOOL_ROUNDS` | `max_tool_rounds` |
//! | `AI_TURN_CONFLICT_BEHAVIOR` | `router.conflict_behavior` |
//! | `AI_TURN_TOOL_EXECUTION` | `tool_execution` |

use crate::resilience::RetryConfig;
use crate::routing::{ConflictBehavior, RouterConfig};
use crate::tools::ToolExecutionMode;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 86_400,
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub router: RouterConfig,
    pub retry: RetryConfig,
    /// Upper bound on provider round-trips spent resolving tool calls in one turn.
    pub max_tool_rounds: u32,
    pub tool_execution: ToolExecutionMode,
    pub idempotency: IdempotencyConfig,
    /// Declare `file_search` automatically when files are attached.
    pub auto_file_search: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            retry: RetryConfig::default(),
            max_tool_rounds: 10,
            tool_execution: ToolExecutionMode::Inline,
            idempotency: IdempotencyConfig::default(),
            auto_file_search: true,
        }
    }
}

impl TurnConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid configuration: {}", e),
                ErrorContext::new().with_source("config"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read configuration file: {}", e),
                ErrorContext::new().with_details(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `AI_TURN_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("AI_TURN_MAX_RETRIES") {
            self.retry.max_retries = parse_number("AI_TURN_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("AI_TURN_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = parse_number("AI_TURN_MAX_TOOL_ROUNDS", &v)?;
        }
        if let Some(v) = lookup("AI_TURN_CONFLICT_BEHAVIOR") {
            self.router.conflict_behavior = v.parse::<ConflictBehavior>()?;
        }
        if let Some(v) = lookup("AI_TURN_TOOL_EXECUTION") {
            self.tool_execution = v.parse::<ToolExecutionMode>()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.router.validate()?;
        self.retry.validate()?;
        if self.max_tool_rounds == 0 {
            return Err(Error::configuration_with_context(
                "max_tool_rounds must be at least 1",
                ErrorContext::new().with_field_path("max_tool_rounds"),
            ));
        }
        if self.idempotency.capacity == 0 {
            return Err(Error::configuration_with_context(
                "idempotency.capacity must be at least 1",
                ErrorContext::new().with_field_path("idempotency.capacity"),
            ));
        }
        Ok(())
    }
}

fn parse_number(var: &str, raw: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|_| {
        Error::configuration_with_context(
            format!("{} must be a non-negative integer", var),
            ErrorContext::new().with_details(format!("got '{}'", raw)),
        )
    })
}
