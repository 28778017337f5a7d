//! # ai-turn
//!
//! 多模态回合运行时：把一次逻辑回合路由到正确的提供方端点，并驱动工具调用直至完成。
//!
//! Multimodal turn runtime. One logical turn (text, audio or image) is routed to
//! exactly one of eight provider endpoints, adapted to that endpoint's wire format,
//! sent with retry and idempotency, and adapted back into a unified response. When
//! the provider asks for tool calls, the orchestrator resolves them and continues
//! the conversation until a final answer arrives.
//!
//! ## Core Philosophy
//!
//! - **One entry point**: every modality goes through the same [`TurnOrchestrator`]
//! - **Pure adapters**: request/response translation never touches the network
//! - **Recoverable tools**: a missing or failing tool becomes an error-tagged result,
//!   never an aborted turn
//! - **Streaming-first**: SSE responses surface as a pull-based event sequence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_turn::tools::ToolRegistry;
//! use ai_turn::transport::HttpTransport;
//! use ai_turn::TurnOrchestrator;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ai_turn::Result<()> {
//!     let mut tools = ToolRegistry::new();
//!     tools.register_fn(
//!         "get_weather",
//!         "Current weather for a city",
//!         json!({"type": "object", "properties": {"city": {"type": "string"}}}),
//!         |args| Ok(json!({"city": args["city"], "forecast": "sunny"})),
//!     )?;
//!
//!     let orchestrator = TurnOrchestrator::builder()
//!         .transport(HttpTransport::builder().build()?)
//!         .tools(tools)
//!         .build()?;
//!
//!     let result = orchestrator
//!         .turn()
//!         .message("What's the weather in Paris?")
//!         .send()
//!         .await?;
//!     println!("{}", result.messages);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | Endpoint selection and conflict handling |
//! | [`adapters`] | Per-endpoint request/response translation and file validation |
//! | [`client`] | Turn orchestrator, builder and fluent request surface |
//! | [`pipeline`] | SSE decoding and streaming event accumulation |
//! | [`tools`] | Tool registry with inline and deferred execution |
//! | [`resilience`] | Exponential backoff retry |
//! | [`store`] | Conversation and idempotency collaborators |
//! | [`transport`] | Provider transport trait and HTTP implementation |
//! | [`config`] | YAML/env configuration |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`types`] | Unified request, response, event and tool types |

pub mod adapters;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod pipeline;
pub mod resilience;
pub mod routing;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{TurnBuilder, TurnOrchestrator, TurnOrchestratorBuilder, TurnResult};
pub use config::TurnConfig;
pub use endpoint::Endpoint;
pub use pipeline::{StreamOptions, StreamingEngine};
pub use routing::{ConflictBehavior, RequestRouter, RouterConfig};
pub use types::{
    AudioConfig, ConversationItem, ImageConfig, ResponseDto, StreamingEvent, ToolCall,
    ToolDefinition, UnifiedRequest,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
