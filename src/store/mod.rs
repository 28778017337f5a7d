//! External collaborators: conversation history and idempotency records.
//!
//! The orchestrator only depends on the traits; the in-memory implementations back
//! tests and single-process deployments.

pub mod conversation;
pub mod idempotency;

pub use conversation::{ConversationStore, InMemoryConversationStore, ListParams, Order};
pub use idempotency::{scoped_key, IdempotencyStore, MemoryIdempotencyStore};
