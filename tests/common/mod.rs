//! Shared fixtures: a scripted provider transport.

#![allow(dead_code)]

use ai_turn::adapters::EndpointRequest;
use ai_turn::transport::ProviderTransport;
use ai_turn::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays queued responses in order and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    streams: Mutex<VecDeque<Result<Vec<String>>>>,
    requests: Mutex<Vec<EndpointRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Value) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_err(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queue an SSE body delivered as the given chunks.
    pub fn push_stream(&self, chunks: &[&str]) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(chunks.iter().map(|c| c.to_string()).collect()));
    }

    pub fn push_stream_err(&self, error: Error) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<EndpointRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn call(&self, request: &EndpointRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::runtime("script exhausted")))
    }

    async fn stream(&self, request: &EndpointRequest) -> Result<BoxStream<'static, Bytes>> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::runtime("script exhausted")))?;
        let items: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Payload field of the `n`-th recorded request.
pub fn sent(transport: &ScriptedTransport, n: usize, key: &str) -> Value {
    transport.requests()[n]
        .payload
        .get(key)
        .cloned()
        .unwrap_or(Value::Null)
}
