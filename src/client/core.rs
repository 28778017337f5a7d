use crate::adapters::AdapterFactory;
use crate::config::TurnConfig;
use crate::endpoint::Endpoint;
use crate::pipeline::{StreamOptions, StreamingEngine};
use crate::resilience::RetryPolicy;
use crate::routing::RequestRouter;
use crate::store::{ConversationStore, IdempotencyStore};
use crate::tools::ToolExecutor;
use crate::transport::ProviderTransport;
use crate::types::{
    ContentPart, ConversationItem, ResponseDto, StreamingEvent, ToolCall, ToolDefinition,
    UnifiedRequest,
};
use crate::{BoxStream, Error, ErrorContext, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::builder::TurnOrchestratorBuilder;
use super::turn::TurnBuilder;

/// Final result of a synchronous turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    pub conversation_id: Option<String>,
    /// Text of the final response (empty for non-text endpoints).
    pub messages: String,
    /// Always empty: a turn only completes once no tool calls remain.
    pub tool_calls: Vec<ToolCall>,
    /// Number of tool rounds executed before the final response.
    pub tool_rounds: u32,
    pub response: ResponseDto,
}

/// Drives one logical turn: route, adapt, call, resolve tool calls, repeat.
///
/// Holds no per-turn state, so one orchestrator serves concurrent turns.
pub struct TurnOrchestrator {
    pub(crate) config: TurnConfig,
    pub(crate) router: RequestRouter,
    pub(crate) adapters: AdapterFactory,
    pub(crate) transport: Arc<dyn ProviderTransport>,
    pub(crate) executor: Arc<dyn ToolExecutor>,
    pub(crate) retry: RetryPolicy,
    pub(crate) conversations: Option<Arc<dyn ConversationStore>>,
    pub(crate) idempotency: Option<Arc<dyn IdempotencyStore>>,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("executor", &self.executor)
            .field("conversations", &self.conversations.is_some())
            .field("idempotency", &self.idempotency.is_some())
            .finish()
    }
}

impl TurnOrchestrator {
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn conversation_store(&self) -> Option<&Arc<dyn ConversationStore>> {
        self.conversations.as_ref()
    }

    /// Start a fluent turn.
    pub fn turn(&self) -> TurnBuilder<'_> {
        TurnBuilder::new(self)
    }

    /// Run a turn to completion, resolving tool calls until the provider returns a
    /// response without any.
    pub async fn run_turn(&self, request: UnifiedRequest) -> Result<TurnResult> {
        let mut request = self.prepare(request);
        request.stream = false;

        let endpoint = self.router.determine_endpoint(&request)?;
        let adapter = self.adapters.make(endpoint);
        let mut conversation_id = request.conversation_id.clone();
        let mut round = 0u32;

        loop {
            let endpoint_request = adapter.transform_request(&request)?;
            info!(endpoint = endpoint.as_str(), round, "provider call");
            let raw = self.call_provider(&endpoint_request, round).await?;
            let response = adapter.transform_response(&raw);

            if conversation_id.is_none() {
                conversation_id = response.conversation_id.clone();
            }

            if response.tool_calls.is_empty() {
                return Ok(TurnResult {
                    conversation_id,
                    messages: response.text.clone().unwrap_or_default(),
                    tool_calls: Vec::new(),
                    tool_rounds: round,
                    response,
                });
            }

            if round >= self.config.max_tool_rounds {
                return Err(Error::MaxToolRounds {
                    max_rounds: self.config.max_tool_rounds,
                });
            }
            round += 1;

            let round_items = self.resolve_tool_calls(&response.tool_calls, round).await;
            if let (Some(store), Some(id)) = (&self.conversations, conversation_id.as_deref()) {
                let results: Vec<ConversationItem> = round_items
                    .iter()
                    .filter(|i| i.is_tool_result())
                    .cloned()
                    .collect();
                if let Err(e) = store.create_items(id, results).await {
                    warn!(conversation_id = id, error = %e, "tool results not appended to conversation store");
                }
            }

            // provider-side conversations already hold the tool calls
            let results_only = endpoint == Endpoint::ResponseApi && conversation_id.is_some();
            request = follow_up(request, round_items, conversation_id.clone(), results_only);
        }
    }

    /// Stream a turn as typed events.
    ///
    /// Tool calls revealed mid-stream are surfaced as `response.tool_call.created`
    /// events and in the final event's `tool_calls`; they are not executed.
    pub async fn stream_turn(
        &self,
        request: UnifiedRequest,
        options: StreamOptions,
    ) -> Result<BoxStream<'static, StreamingEvent>> {
        let mut request = self.prepare(request);
        request.stream = true;

        let endpoint = self.router.determine_endpoint(&request)?;
        if !endpoint.supports_streaming() {
            return Err(Error::validation_with_context(
                format!("endpoint '{}' does not support streaming", endpoint),
                ErrorContext::new()
                    .with_field_path("stream")
                    .with_source("turn_orchestrator"),
            ));
        }
        let endpoint_request = self.adapters.make(endpoint).transform_request(&request)?;
        info!(endpoint = endpoint.as_str(), "provider stream");
        let bytes = self.open_stream(&endpoint_request).await?;
        Ok(StreamingEngine::stream(bytes, options))
    }

    /// Execute every call of a round in order, pairing each with its result item.
    async fn resolve_tool_calls(&self, calls: &[ToolCall], round: u32) -> Vec<ConversationItem> {
        info!(round, calls = calls.len(), "resolving tool calls");
        let mut items = Vec::with_capacity(calls.len() * 2);
        for call in calls {
            let outcome = self.executor.execute(call).await;
            debug!(
                tool = call.name.as_str(),
                call_id = call.id.as_str(),
                error = outcome.is_error(),
                "tool call resolved"
            );
            items.push(ConversationItem::tool_call(call));
            items.push(ConversationItem::tool_result(
                call.id.clone(),
                outcome.result_text(),
            ));
        }
        items
    }

    /// Merge executor declarations into the request and add `file_search` for attachments.
    fn prepare(&self, mut request: UnifiedRequest) -> UnifiedRequest {
        for declaration in self.executor.declarations() {
            if !request.tools.iter().any(|t| t.name() == declaration.name()) {
                request.tools.push(declaration);
            }
        }
        if self.config.auto_file_search
            && request.wants_file_search()
            && !request.tools.iter().any(|t| t.tool_type == "file_search")
        {
            debug!("attachments present, declaring file_search");
            request.tools.push(ToolDefinition::file_search());
        }
        request
    }
}

/// Build the next round's request from the previous one plus this round's items.
fn follow_up(
    mut request: UnifiedRequest,
    round_items: Vec<ConversationItem>,
    conversation_id: Option<String>,
    results_only: bool,
) -> UnifiedRequest {
    request.conversation_id = conversation_id;
    if results_only {
        request.input = round_items
            .into_iter()
            .filter(|i| i.is_tool_result())
            .collect();
        request.text = None;
        request.file_ids.clear();
        request.attachments.clear();
        return request;
    }

    // replay the caller's text (and files) as a user item ahead of the tool items
    let files = request.attached_file_ids();
    if let Some(text) = request.text.take().filter(|t| !t.is_empty()) {
        let mut item = ConversationItem::user(text);
        item.content
            .extend(files.into_iter().map(|file_id| ContentPart::File { file_id }));
        request.input.push(item);
        request.file_ids.clear();
        request.attachments.clear();
    }
    request.input.extend(round_items);
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemType;
    use serde_json::json;

    fn round() -> Vec<ConversationItem> {
        let call = ToolCall::new("call_1", "lookup", json!({"q": "x"}));
        vec![
            ConversationItem::tool_call(&call),
            ConversationItem::tool_result("call_1", "{\"ok\":true}"),
        ]
    }

    #[test]
    fn follow_up_replays_full_history_without_conversation() {
        let mut request = UnifiedRequest::text("find x");
        request.file_ids = vec!["file_1".into()];
        let next = follow_up(request, round(), None, false);
        assert!(next.text.is_none());
        assert!(next.file_ids.is_empty());
        let types: Vec<ItemType> = next.input.iter().map(|i| i.item_type).collect();
        assert_eq!(
            types,
            vec![ItemType::Message, ItemType::ToolCall, ItemType::ToolResult]
        );
        assert_eq!(next.input[0].text(), "find x");
        assert!(next.input[0]
            .content
            .contains(&ContentPart::File { file_id: "file_1".into() }));
    }

    #[test]
    fn follow_up_sends_only_results_with_conversation() {
        let request = UnifiedRequest::text("find x");
        let next = follow_up(request, round(), Some("conv_1".into()), true);
        assert_eq!(next.conversation_id.as_deref(), Some("conv_1"));
        assert_eq!(next.input.len(), 1);
        assert_eq!(next.input[0].tool_call_id.as_deref(), Some("call_1"));
        assert!(next.text.is_none());
    }
}
