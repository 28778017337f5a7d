//! 日志初始化：基于 tracing-subscriber 的环境过滤器。
//!
//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the
//! application. [`init_tracing`] is a convenience for binaries and tests.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `AI_TURN_LOG` | filter directives, e.g. `ai_turn=debug` |
//! | `RUST_LOG` | fallback when `AI_TURN_LOG` is unset |

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn filter_directives() -> String {
    std::env::var("AI_TURN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
}

/// Install a global fmt subscriber. Returns `false` when one was already installed.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_new(filter_directives())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_a_no_op() {
        init_tracing();
        assert!(!init_tracing());
    }
}
