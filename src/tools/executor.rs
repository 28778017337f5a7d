//! Tool execution policies.
//!
//! [`InlineExecutor`] awaits the callable in place. [`DeferredExecutor`] dispatches it as
//! a background tokio task and either waits for it or returns [`ToolOutcome::Pending`]
//! straight away.

use super::registry::{RegisteredTool, ToolRegistry};
use crate::types::ToolCall;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reserved argument keys consumed by the deferred policy.
pub const RESERVED_NAME_KEY: &str = "__name";
pub const RESERVED_PARALLEL_KEY: &str = "__parallel";

/// Finished fire-and-forget outcomes kept for [`DeferredExecutor::job_result`].
pub const DEFAULT_RESULT_CAPACITY: usize = 1024;

/// Result of resolving one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Completed { output: Value },
    /// Dispatched in the background; the result materializes later under `job_id`.
    Pending { tool: String, job_id: String },
    NotFound { tool: String },
    Failed { tool: String, message: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Failed { .. })
    }

    /// Text body of the `tool_result` item fed back to the provider.
    pub fn result_text(&self) -> String {
        match self {
            Self::Completed { output: Value::String(s) } => s.clone(),
            Self::Completed { output } => output.to_string(),
            Self::Pending { tool, .. } => json!({"queued": true, "tool": tool}).to_string(),
            Self::NotFound { tool } => json!({
                "error": format!("tool '{}' not found", tool),
                "tool": tool,
            })
            .to_string(),
            Self::Failed { tool, message } => json!({
                "error": message,
                "tool": tool,
            })
            .to_string(),
        }
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync + std::fmt::Debug {
    async fn execute(&self, call: &ToolCall) -> ToolOutcome;

    /// Declarations of every tool this executor can run.
    fn declarations(&self) -> Vec<crate::types::ToolDefinition>;
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// Run the callable, turning errors and panics into [`ToolOutcome::Failed`].
async fn run_tool(tool: Arc<RegisteredTool>, arguments: Value) -> ToolOutcome {
    let name = tool.name().to_string();
    // also catches handlers that panic before returning their future
    match AssertUnwindSafe(async move { tool.invoke(arguments).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(output)) => ToolOutcome::Completed { output },
        Ok(Err(e)) => {
            warn!(tool = name.as_str(), error = %e, "tool failed");
            ToolOutcome::Failed {
                tool: name,
                message: format!("{:#}", e),
            }
        }
        Err(payload) => {
            let message = panic_message(payload);
            warn!(tool = name.as_str(), error = message.as_str(), "tool panicked");
            ToolOutcome::Failed { tool: name, message }
        }
    }
}

/// Executes each call directly and returns its result.
#[derive(Debug, Clone)]
pub struct InlineExecutor {
    registry: Arc<ToolRegistry>,
}

impl InlineExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecutor for InlineExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        match self.registry.get(&call.name) {
            Some(tool) => run_tool(tool, call.arguments.clone()).await,
            None => ToolOutcome::NotFound {
                tool: call.name.clone(),
            },
        }
    }

    fn declarations(&self) -> Vec<crate::types::ToolDefinition> {
        self.registry.declarations()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferredMode {
    /// Return a `{queued, tool}` placeholder immediately.
    #[default]
    FireAndForget,
    /// Run in the background task and block the round on its result.
    SubmitAndWait,
}

/// Dispatches calls onto tokio tasks.
///
/// `__parallel: true` in the arguments forces fire-and-forget for that call and
/// `__parallel: false` forces waiting; `__name` becomes the job id. Both keys are
/// removed before the callable sees the arguments.
#[derive(Debug)]
pub struct DeferredExecutor {
    registry: Arc<ToolRegistry>,
    mode: DeferredMode,
    jobs: Mutex<Vec<JoinHandle<()>>>,
    results: Arc<Mutex<LruCache<String, ToolOutcome>>>,
}

impl DeferredExecutor {
    pub fn new(registry: Arc<ToolRegistry>, mode: DeferredMode) -> Self {
        Self::with_result_capacity(registry, mode, DEFAULT_RESULT_CAPACITY)
    }

    /// Keep at most `capacity` finished outcomes; the least recently touched go first.
    pub fn with_result_capacity(
        registry: Arc<ToolRegistry>,
        mode: DeferredMode,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            mode,
            jobs: Mutex::new(Vec::new()),
            results: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn mode(&self) -> DeferredMode {
        self.mode
    }

    /// Outcome of a fire-and-forget job, once it has finished.
    pub fn job_result(&self, job_id: &str) -> Option<ToolOutcome> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .cloned()
    }

    /// Fire-and-forget jobs still running.
    pub fn pending_jobs(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.retain(|h| !h.is_finished());
        jobs.len()
    }

    /// Finished outcomes currently retained.
    pub fn retained_results(&self) -> usize {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait for every outstanding fire-and-forget job.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *jobs)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "deferred tool job aborted");
            }
        }
    }
}

/// Strip the reserved control keys, returning `(job_name, parallel)`.
fn strip_reserved(arguments: &mut Value) -> (Option<String>, Option<bool>) {
    let Some(obj) = arguments.as_object_mut() else {
        return (None, None);
    };
    let name = obj
        .remove(RESERVED_NAME_KEY)
        .and_then(|v| v.as_str().map(|s| s.to_string()));
    let parallel = obj.remove(RESERVED_PARALLEL_KEY).and_then(|v| v.as_bool());
    (name, parallel)
}

#[async_trait]
impl ToolExecutor for DeferredExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.registry.get(&call.name) else {
            return ToolOutcome::NotFound {
                tool: call.name.clone(),
            };
        };
        let mut arguments = call.arguments.clone();
        let (job_name, parallel) = strip_reserved(&mut arguments);
        let fire_and_forget = parallel.unwrap_or(self.mode == DeferredMode::FireAndForget);

        if !fire_and_forget {
            return match tokio::spawn(run_tool(tool, arguments)).await {
                Ok(outcome) => outcome,
                Err(e) => ToolOutcome::Failed {
                    tool: call.name.clone(),
                    message: format!("background task failed: {}", e),
                },
            };
        }

        let job_id = job_name.unwrap_or_else(|| format!("job_{}", uuid::Uuid::new_v4().simple()));
        debug!(tool = call.name.as_str(), job_id = job_id.as_str(), "dispatched deferred tool");
        let results = self.results.clone();
        let key = job_id.clone();
        let handle = tokio::spawn(async move {
            let outcome = run_tool(tool, arguments).await;
            results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .put(key, outcome);
        });
        {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.retain(|h| !h.is_finished());
            jobs.push(handle);
        }
        ToolOutcome::Pending {
            tool: call.name.clone(),
            job_id,
        }
    }

    fn declarations(&self) -> Vec<crate::types::ToolDefinition> {
        self.registry.declarations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(counter: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        r.register_fn("echo", "Echo", json!({"type": "object"}), move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(args)
        })
        .unwrap();
        r.register_fn("boom", "Always fails", json!({"type": "object"}), |_| {
            Err(anyhow::anyhow!("disk on fire"))
        })
        .unwrap();
        r.register_fn("panics", "Panics", json!({"type": "object"}), |_| panic!("oops"))
            .unwrap();
        Arc::new(r)
    }

    #[tokio::test]
    async fn inline_paths() {
        let exec = InlineExecutor::new(registry(Arc::new(AtomicUsize::new(0))));
        let ok = exec.execute(&ToolCall::new("1", "echo", json!({"a": 1}))).await;
        assert_eq!(ok, ToolOutcome::Completed { output: json!({"a": 1}) });

        let missing = exec.execute(&ToolCall::new("2", "nope", json!({}))).await;
        assert!(missing.result_text().contains("error"));
        assert!(missing.result_text().contains("nope"));

        let failed = exec.execute(&ToolCall::new("3", "boom", json!({}))).await;
        assert!(failed.result_text().contains("error"));
        assert!(failed.result_text().contains("disk on fire"));

        let panicked = exec.execute(&ToolCall::new("4", "panics", json!({}))).await;
        assert!(panicked.result_text().contains("oops"));
    }

    #[tokio::test]
    async fn deferred_fire_and_forget_strips_reserved_keys() {
        let counter = Arc::new(AtomicUsize::new(0));
        let exec = DeferredExecutor::new(registry(counter.clone()), DeferredMode::FireAndForget);
        let outcome = exec
            .execute(&ToolCall::new("1", "echo", json!({"__name": "job-a", "__parallel": true, "x": 1})))
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::Pending { tool: "echo".into(), job_id: "job-a".into() }
        );
        assert_eq!(outcome.result_text(), json!({"queued": true, "tool": "echo"}).to_string());

        exec.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(
            exec.job_result("job-a"),
            Some(ToolOutcome::Completed { output: json!({"x": 1}) })
        );
    }

    #[tokio::test]
    async fn deferred_submit_and_wait() {
        let exec = DeferredExecutor::new(
            registry(Arc::new(AtomicUsize::new(0))),
            DeferredMode::SubmitAndWait,
        );
        let outcome = exec
            .execute(&ToolCall::new("1", "echo", json!({"__name": "n", "y": 2})))
            .await;
        assert_eq!(outcome, ToolOutcome::Completed { output: json!({"y": 2}) });

        let forced = exec
            .execute(&ToolCall::new("2", "echo", json!({"__parallel": true})))
            .await;
        assert!(matches!(forced, ToolOutcome::Pending { .. }));
        exec.drain().await;
    }

    #[tokio::test]
    async fn handler_panicking_before_its_future_is_contained() {
        let mut r = ToolRegistry::new();
        r.register(
            "eager",
            "Panics while building its future",
            json!({"type": "object"}),
            |_args: Value| -> futures::future::Ready<anyhow::Result<Value>> { panic!("eager boom") },
        )
        .unwrap();
        let exec = InlineExecutor::new(Arc::new(r));

        let outcome = exec.execute(&ToolCall::new("1", "eager", json!({}))).await;
        assert_eq!(
            outcome,
            ToolOutcome::Failed { tool: "eager".into(), message: "eager boom".into() }
        );
    }

    #[tokio::test]
    async fn finished_jobs_leave_the_backlog() {
        let counter = Arc::new(AtomicUsize::new(0));
        let exec = DeferredExecutor::with_result_capacity(
            registry(counter.clone()),
            DeferredMode::FireAndForget,
            2,
        );
        for i in 0..4 {
            let call = ToolCall::new(i.to_string(), "echo", json!({"__name": format!("job-{i}"), "i": i}));
            assert!(matches!(exec.execute(&call).await, ToolOutcome::Pending { .. }));
        }
        assert_eq!(exec.jobs.lock().unwrap().len(), 4);
        while exec.jobs.lock().unwrap().iter().any(|h| !h.is_finished()) {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        exec.execute(&ToolCall::new("4", "echo", json!({"__name": "job-4"}))).await;
        assert_eq!(exec.jobs.lock().unwrap().len(), 1);

        exec.drain().await;
        assert_eq!(exec.pending_jobs(), 0);
        assert_eq!(exec.retained_results(), 2);
        assert_eq!(exec.job_result("job-0"), None);
        assert_eq!(exec.job_result("job-4"), Some(ToolOutcome::Completed { output: json!({}) }));
    }
}
