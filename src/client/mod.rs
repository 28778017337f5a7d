//! 回合编排：路由、适配、调用提供方，并驱动工具调用循环直至完成。
//!
//! Turn orchestration.
//!
//! | Type | Role |
//! |------|------|
//! | [`TurnOrchestrator`] | route → adapt → call → resolve tool calls → repeat |
//! | [`TurnOrchestratorBuilder`] | wires config and collaborators |
//! | [`TurnBuilder`] | fluent per-turn request surface |
//! | [`TurnResult`] | final text, conversation id and unified response |
//!
//! Synchronous turns are strictly sequential: each provider call is awaited, every
//! tool call of a round is resolved in order, and only then is the follow-up call
//! issued. Streaming turns retry only the connection phase.

mod builder;
mod core;
mod execution;
mod turn;

pub use builder::TurnOrchestratorBuilder;
pub use core::{TurnOrchestrator, TurnResult};
pub use turn::TurnBuilder;
