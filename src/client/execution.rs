//! 请求执行：带重试与幂等缓存的单次端点调用。
//!
//! Provider call execution (retry + idempotency).

use crate::adapters::EndpointRequest;
use crate::store::scoped_key;
use crate::{BoxStream, Result};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

use super::core::TurnOrchestrator;

impl TurnOrchestrator {
    /// One provider round-trip for tool round `round`.
    ///
    /// With an idempotency key, a stored response for the same key, endpoint and round
    /// short-circuits the network entirely; fresh responses are recorded after success.
    pub(crate) async fn call_provider(&self, request: &EndpointRequest, round: u32) -> Result<Value> {
        let store_key = match (&self.idempotency, request.idempotency_key.as_deref()) {
            (Some(_), Some(key)) => Some(scoped_key(key, request.endpoint, round)),
            _ => None,
        };

        if let (Some(store), Some(key)) = (&self.idempotency, store_key.as_deref()) {
            if let Some(previous) = store.get(key).await? {
                debug!(endpoint = request.endpoint.as_str(), round, "idempotency hit");
                return Ok(previous);
            }
        }

        let transport = &self.transport;
        let response = self
            .retry
            .run(request.endpoint.as_str(), |_| transport.call(request))
            .await?;

        if let (Some(store), Some(key)) = (&self.idempotency, store_key.as_deref()) {
            if let Err(e) = store.put(key, response.clone()).await {
                warn!(error = %e, "failed to record idempotent response");
            }
        }
        Ok(response)
    }

    /// Open a provider stream. Only the connection phase is retried; once bytes flow,
    /// failures surface from the stream itself.
    pub(crate) async fn open_stream(
        &self,
        request: &EndpointRequest,
    ) -> Result<BoxStream<'static, Bytes>> {
        let transport = &self.transport;
        self.retry
            .run(request.endpoint.as_str(), |_| transport.stream(request))
            .await
    }
}
