use super::{ProviderTransport, TransportError};
use crate::adapters::{speech_payload, EndpointRequest};
use crate::endpoint::Endpoint;
use crate::{BoxStream, Error, ErrorContext, Result};
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Proxy, RequestBuilder, Response};
use serde_json::Value;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Builder for [`HttpTransport`]. Unset values fall back to environment variables.
#[derive(Debug, Clone, Default)]
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    proxy: Option<String>,
}

impl HttpTransportBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let raw_base = self
            .base_url
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&raw_base).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url '{}': {}", raw_base, e),
                ErrorContext::new().with_field_path("transport.base_url"),
            )
        })?;

        let timeout = self.timeout.unwrap_or_else(|| {
            Duration::from_secs(
                env::var("AI_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60),
            )
        });

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = self.proxy.or_else(|| env::var("AI_PROXY_URL").ok()) {
            let proxy = Proxy::all(&proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url '{}': {}", proxy_url, e),
                    ErrorContext::new().with_field_path("transport.proxy"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(HttpTransport {
            client,
            base_url,
            api_key: self.api_key.or_else(|| env::var("OPENAI_API_KEY").ok()),
        })
    }
}

/// OpenAI-layout HTTP transport on `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.path()
        )
    }

    async fn prepare(&self, request: &EndpointRequest, streaming: bool) -> Result<RequestBuilder> {
        let mut req = self.client.post(self.url_for(request.endpoint));

        req = if request.endpoint.is_multipart() {
            req.multipart(multipart_form(request).await?)
        } else if streaming {
            let mut body = request.payload.clone();
            body.insert("stream".to_string(), Value::Bool(true));
            req.json(&body)
                .header(reqwest::header::ACCEPT, "text/event-stream")
        } else {
            req.json(&request.payload)
        };

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(key) = &request.idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        Ok(req)
    }

    async fn send(&self, req: RequestBuilder, endpoint: Endpoint) -> Result<Response> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let status = response.status();
        debug!(endpoint = endpoint.as_str(), status = status.as_u16(), "provider responded");
        if status.is_success() {
            return Ok(response);
        }

        let retry_after_ms = retry_after_ms(&response);
        let body = response.text().await.unwrap_or_default();
        Err(Error::remote(
            status.as_u16(),
            remote_message(&body, status.canonical_reason()),
            retry_after_ms,
        ))
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn call(&self, request: &EndpointRequest) -> Result<Value> {
        info!(endpoint = request.endpoint.as_str(), "calling provider");
        let req = self.prepare(request, false).await?;
        let response = self.send(req, request.endpoint).await?;

        if request.endpoint == Endpoint::AudioSpeech {
            let audio = response
                .bytes()
                .await
                .map_err(|e| Error::Transport(TransportError::Http(e)))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&audio);
            return Ok(speech_payload(encoded, request));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        // text/srt/vtt transcription formats come back as plain text
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    async fn stream(&self, request: &EndpointRequest) -> Result<BoxStream<'static, Bytes>> {
        info!(endpoint = request.endpoint.as_str(), "opening provider stream");
        let req = self.prepare(request, true).await?;
        let response = self.send(req, request.endpoint).await?;
        let bytes = response
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(Box::pin(bytes))
    }
}

async fn multipart_form(request: &EndpointRequest) -> Result<Form> {
    let mut form = Form::new();
    for (key, value) in &request.payload {
        if request.is_file_field(key) {
            let Some(path) = request.file_path(key) else {
                continue;
            };
            let data = tokio::fs::read(&path).await?;
            form = form.part(key.clone(), Part::bytes(data).file_name(file_name(&path)));
            continue;
        }
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        form = form.text(key.clone(), text);
    }
    Ok(form)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// `Retry-After` in delta-seconds; HTTP-date values are ignored.
fn retry_after_ms(response: &Response) -> Option<u32> {
    let raw = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).min(u32::MAX as f64) as u32)
}

fn remote_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let msg = v
            .pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error"))
            .and_then(|m| m.as_str());
        if let Some(msg) = msg {
            return msg.to_string();
        }
    }
    if body.trim().is_empty() {
        reason.unwrap_or("request failed").to_string()
    } else {
        body.trim().to_string()
    }
}
