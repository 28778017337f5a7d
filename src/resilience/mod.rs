//! 弹性模块：指数退避重试策略。
//!
//! # Resilience
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RetryPolicy`] | Exponential backoff with jitter, retry count and delay ceiling |
//! | [`RetryConfig`] | Serializable policy settings |
//!
//! Retry eligibility comes from [`crate::Error::is_retryable`]; remote errors are
//! further filtered by the configured status list.
//!
//! ```rust
//! use ai_turn::resilience::{RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(RetryConfig { jitter: false, ..Default::default() });
//! assert_eq!(policy.backoff_delay(1, None), Duration::from_millis(500));
//! ```

pub mod retry;

pub use retry::{Decision, RetryConfig, RetryPolicy};
