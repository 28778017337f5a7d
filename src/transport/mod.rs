//! Provider transport: the boundary between the turn runtime and the network.
//!
//! The orchestrator talks to providers only through [`ProviderTransport`]; tests swap
//! in scripted transports, production uses [`HttpTransport`].

mod http;

pub use http::{HttpTransport, HttpTransportBuilder};

use crate::adapters::EndpointRequest;
use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

#[async_trait]
pub trait ProviderTransport: Send + Sync + std::fmt::Debug {
    /// One synchronous provider call returning the decoded response body.
    async fn call(&self, request: &EndpointRequest) -> Result<Value>;

    /// Open a server-sent event stream. Errors before the first byte surface here;
    /// mid-stream failures surface as stream items.
    async fn stream(&self, request: &EndpointRequest) -> Result<BoxStream<'static, Bytes>>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
