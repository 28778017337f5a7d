use crate::adapters::{AdapterFactory, FileValidator, FsFileValidator};
use crate::client::core::TurnOrchestrator;
use crate::config::TurnConfig;
use crate::resilience::RetryPolicy;
use crate::routing::RequestRouter;
use crate::store::{ConversationStore, IdempotencyStore, MemoryIdempotencyStore};
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::transport::{HttpTransport, ProviderTransport};
use crate::Result;
use std::sync::Arc;

/// Builder for [`TurnOrchestrator`].
///
/// Collaborators left unset fall back to: [`HttpTransport`] configured from the
/// environment, an empty tool registry, the configured execution policy, an in-memory
/// idempotency store sized by the config, and the filesystem file validator.
/// No conversation store is attached unless one is given.
#[derive(Default)]
pub struct TurnOrchestratorBuilder {
    config: Option<TurnConfig>,
    transport: Option<Arc<dyn ProviderTransport>>,
    registry: Option<ToolRegistry>,
    executor: Option<Arc<dyn ToolExecutor>>,
    conversations: Option<Arc<dyn ConversationStore>>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    file_validator: Option<Arc<dyn FileValidator>>,
}

impl TurnOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: TurnConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn transport(mut self, transport: impl ProviderTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn ProviderTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the executor derived from `tool_execution`.
    pub fn tool_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn conversation_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.conversations = Some(store);
        self
    }

    pub fn idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }

    pub fn file_validator(mut self, validator: Arc<dyn FileValidator>) -> Self {
        self.file_validator = Some(validator);
        self
    }

    pub fn build(self) -> Result<TurnOrchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let router = RequestRouter::new(config.router.clone())?;
        let transport: Arc<dyn ProviderTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::builder().build()?),
        };
        let registry = Arc::new(self.registry.unwrap_or_default());
        let executor = self
            .executor
            .unwrap_or_else(|| config.tool_execution.executor(registry));
        let idempotency = self.idempotency.unwrap_or_else(|| {
            Arc::new(MemoryIdempotencyStore::new(
                config.idempotency.capacity,
                config.idempotency.ttl(),
            ))
        });
        let validator = self
            .file_validator
            .unwrap_or_else(|| Arc::new(FsFileValidator));

        Ok(TurnOrchestrator {
            retry: RetryPolicy::new(config.retry.clone()),
            router,
            adapters: AdapterFactory::new(validator),
            transport,
            executor,
            conversations: self.conversations,
            idempotency: Some(idempotency),
            config,
        })
    }
}
