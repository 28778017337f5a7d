use crate::pipeline::StreamOptions;
use crate::types::{
    AudioConfig, ConversationItem, ImageConfig, StreamingEvent, ToolDefinition, UnifiedRequest,
};
use crate::{BoxStream, Result};
use serde_json::Value;

use super::core::{TurnOrchestrator, TurnResult};

/// Fluent request builder for one turn.
///
/// ```rust,no_run
/// # async fn demo(orchestrator: ai_turn::TurnOrchestrator) -> ai_turn::Result<()> {
/// let result = orchestrator
///     .turn()
///     .instructions("Answer briefly.")
///     .message("What's the weather in Paris?")
///     .model("gpt-4o")
///     .send()
///     .await?;
/// println!("{}", result.messages);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TurnBuilder<'a> {
    orchestrator: &'a TurnOrchestrator,
    request: UnifiedRequest,
}

impl<'a> TurnBuilder<'a> {
    pub(crate) fn new(orchestrator: &'a TurnOrchestrator) -> Self {
        Self {
            orchestrator,
            request: UnifiedRequest::default(),
        }
    }

    /// User text for the turn.
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.request.text = Some(text.into());
        self
    }

    /// Chat-style message list; routes to chat completions.
    pub fn messages(mut self, messages: Vec<ConversationItem>) -> Self {
        self.request.messages = messages;
        self
    }

    /// Prior conversation items to send ahead of the message.
    pub fn input(mut self, items: Vec<ConversationItem>) -> Self {
        self.request.input = items;
        self
    }

    pub fn audio(mut self, audio: AudioConfig) -> Self {
        self.request.audio = Some(audio);
        self
    }

    pub fn image(mut self, image: ImageConfig) -> Self {
        self.request.image = Some(image);
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.request.instructions = Some(text.into());
        self
    }

    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.request.model = Some(name.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    /// `"auto"`, `"none"`, `"required"` or a provider tool-choice object.
    pub fn tool_choice(mut self, choice: impl Into<Value>) -> Self {
        self.request.tool_choice = Some(choice.into());
        self
    }

    pub fn response_format(mut self, format: Value) -> Self {
        self.request.response_format = Some(format);
        self
    }

    /// Tool declarations sent in addition to the registered tools.
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.request.tools = tools;
        self
    }

    pub fn modalities(mut self, modalities: Vec<String>) -> Self {
        self.request.modalities = modalities;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.metadata.insert(key.into(), value.into());
        self
    }

    pub fn conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.request.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.request.idempotency_key = Some(key.into());
        self
    }

    pub fn file_ids(mut self, ids: Vec<String>) -> Self {
        self.request.file_ids = ids;
        self
    }

    pub fn attachments(mut self, attachments: Vec<Value>) -> Self {
        self.request.attachments = attachments;
        self
    }

    /// `false` suppresses the automatic `file_search` declaration for attachments.
    pub fn use_file_search(mut self, enabled: bool) -> Self {
        self.request.use_file_search = Some(enabled);
        self
    }

    /// Force an endpoint by name, bypassing routing predicates.
    pub fn endpoint(mut self, name: impl Into<String>) -> Self {
        self.request.endpoint = Some(name.into());
        self
    }

    pub fn request(&self) -> &UnifiedRequest {
        &self.request
    }

    pub fn into_request(self) -> UnifiedRequest {
        self.request
    }

    pub async fn send(self) -> Result<TurnResult> {
        self.orchestrator.run_turn(self.request).await
    }

    pub async fn stream(self, options: StreamOptions) -> Result<BoxStream<'static, StreamingEvent>> {
        self.orchestrator.stream_turn(self.request, options).await
    }
}
