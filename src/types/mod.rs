//! 类型系统模块：统一请求、统一响应、会话条目、工具调用与流式事件。
//!
//! # Types Module
//!
//! Endpoint-agnostic shapes the caller builds and receives.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UnifiedRequest`] | One logical turn: text, audio or image instructions plus cross-cutting fields |
//! | [`ResponseDto`] | Unified response produced by every adapter |
//! | [`ConversationItem`] | Role-tagged message, tool call or tool result |
//! | [`ToolCall`] / [`ToolDefinition`] | Function calling primitives |
//! | [`StreamingEvent`] | Typed, accumulated streaming event |
//!
//! ## Example
//!
//! ```rust
//! use ai_turn::types::{AudioConfig, UnifiedRequest};
//!
//! let request = UnifiedRequest::new().with_audio(AudioConfig::transcribe("meeting.mp3"));
//! assert_eq!(request.populated_modalities(), 1);
//! ```

pub mod conversation;
pub mod events;
pub mod request;
pub mod response;
pub mod tool;

pub use conversation::{ContentPart, ConversationItem, ItemType, Role};
pub use events::{StreamEventType, StreamingEvent};
pub use request::{AudioAction, AudioConfig, ImageConfig, UnifiedRequest};
pub use response::{ImageData, ResponseDto, ResponseType};
pub use tool::{FunctionDefinition, ToolCall, ToolDefinition};
