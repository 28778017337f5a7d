//! 工具调用：注册表与执行策略（内联 / 延迟）。
//!
//! # Tools
//!
//! | Type | Role |
//! |------|------|
//! | [`ToolRegistry`] | name → callable + declaration, argument schema validation |
//! | [`ToolExecutor`] | strategy seam used by the orchestrator |
//! | [`InlineExecutor`] | await the callable in place |
//! | [`DeferredExecutor`] | background dispatch, fire-and-forget or submit-and-wait |
//! | [`ToolOutcome`] | completed / pending / not found / failed |
//!
//! Tool failures never abort a turn: they become error-tagged tool results.

mod executor;
mod registry;

pub use executor::{
    DeferredExecutor, DeferredMode, InlineExecutor, ToolExecutor, ToolOutcome,
    RESERVED_NAME_KEY, RESERVED_PARALLEL_KEY,
};
pub use registry::{RegisteredTool, ToolFuture, ToolRegistry};

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Execution policy selected at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionMode {
    #[default]
    Inline,
    /// Fire-and-forget background dispatch.
    Deferred,
    /// Background dispatch, blocking the round on each result.
    DeferredWait,
}

impl std::str::FromStr for ToolExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "inline" => Ok(Self::Inline),
            "deferred" | "background" => Ok(Self::Deferred),
            "deferred_wait" => Ok(Self::DeferredWait),
            other => Err(Error::configuration_with_context(
                format!("unknown tool execution mode '{}'", other),
                ErrorContext::new()
                    .with_field_path("tool_execution")
                    .with_details("expected one of: inline, deferred, deferred_wait"),
            )),
        }
    }
}

impl ToolExecutionMode {
    pub fn executor(&self, registry: Arc<ToolRegistry>) -> Arc<dyn ToolExecutor> {
        match self {
            Self::Inline => Arc::new(InlineExecutor::new(registry)),
            Self::Deferred => Arc::new(DeferredExecutor::new(registry, DeferredMode::FireAndForget)),
            Self::DeferredWait => {
                Arc::new(DeferredExecutor::new(registry, DeferredMode::SubmitAndWait))
            }
        }
    }
}
