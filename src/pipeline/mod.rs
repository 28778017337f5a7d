//! 流式处理模块：把 SSE 字节流解析为带累积文本的类型化事件。
//!
//! # Streaming Engine
//!
//! ```text
//! Raw Bytes → decode_sse → EventMapper → StreamingEngine → StreamingEvent
//!     │           │             │               │
//!   HTTP     event:/data:   envelope       accumulation,
//!            framing        normalization  callbacks, stop
//! ```
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`decode`] | SSE framing over a byte stream |
//! | [`event_map`] | Normalizes typed, flat and chat-chunk envelopes |
//! | [`accumulate`] | Running text buffer |
//! | [`StreamingEngine`] | Produces the caller-facing event sequence |
//!
//! Every text delta event carries both the fragment (`data.delta`) and the full text so
//! far (`data.accumulated`). The sequence ends after one final `response.completed`
//! event, synthesized at end of input when the provider did not send one. A
//! `response.canceled` frame ends the sequence with [`Error::Cancelled`] instead.

pub mod accumulate;
pub mod decode;
pub mod event_map;

use crate::types::events::{StreamEventType, StreamingEvent};
use crate::{BoxStream, Error, Result};
use accumulate::TextAccumulator;
use bytes::Bytes;
use decode::{decode_sse, SseFrame};
use event_map::{EventMapper, Signal};
use futures::{stream, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

pub type EventCallback = Arc<dyn Fn(&StreamingEvent) + Send + Sync>;
pub type StopPredicate = Arc<dyn Fn(&StreamingEvent) -> bool + Send + Sync>;

/// Per-stream hooks.
#[derive(Clone, Default)]
pub struct StreamOptions {
    /// Invoked for every event before it is yielded.
    pub on_event: Option<EventCallback>,
    /// Evaluated after every event; `true` ends the sequence after that event.
    pub should_stop: Option<StopPredicate>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(mut self, f: impl Fn(&StreamingEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    pub fn should_stop(
        mut self,
        f: impl Fn(&StreamingEvent) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_stop = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("on_event", &self.on_event.is_some())
            .field("should_stop", &self.should_stop.is_some())
            .finish()
    }
}

struct EngineState {
    frames: BoxStream<'static, SseFrame>,
    mapper: EventMapper,
    acc: TextAccumulator,
    queue: VecDeque<StreamingEvent>,
    error: Option<Error>,
    finished: bool,
    options: StreamOptions,
}

impl EngineState {
    fn completion(&self, mut data: Value) -> StreamingEvent {
        if !data.is_object() {
            data = json!({});
        }
        if let Some(obj) = data.as_object_mut() {
            let text = self.acc.text().to_string();
            obj.entry("accumulated").or_insert_with(|| json!(text));
            if !text.is_empty() {
                obj.entry("text").or_insert_with(|| json!(text));
            }
            let calls = self.mapper.tool_calls();
            if !calls.is_empty() {
                obj.entry("tool_calls")
                    .or_insert_with(|| serde_json::to_value(calls).unwrap_or(Value::Null));
            }
            if let Some(id) = self.mapper.response_id() {
                obj.entry("id").or_insert_with(|| json!(id));
            }
        }
        StreamingEvent::final_event(StreamEventType::Completed, data)
    }

    fn apply(&mut self, signal: Signal) {
        match signal {
            Signal::TextDelta(delta) => {
                let accumulated = self.acc.push(&delta).to_string();
                self.queue.push_back(StreamingEvent::new(
                    StreamEventType::OutputTextDelta,
                    json!({"delta": delta, "accumulated": accumulated}),
                ));
            }
            Signal::ToolCall(data) => self
                .queue
                .push_back(StreamingEvent::new(StreamEventType::ToolCallCreated, data)),
            Signal::Completed(data) => {
                let ev = self.completion(data);
                self.queue.push_back(ev);
            }
            Signal::Canceled(data) => {
                let response_id = data
                    .get("response_id")
                    .or_else(|| data.get("id"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| self.mapper.response_id().map(|s| s.to_string()));
                self.error = Some(Error::Cancelled { response_id });
            }
            Signal::Failed(data) => self.error = Some(stream_failure(&data)),
            Signal::Other(name, data) => self
                .queue
                .push_back(StreamingEvent::new(StreamEventType::Other(name), data)),
        }
    }
}

/// Error carried by an `error` / `response.failed` frame.
fn stream_failure(data: &Value) -> Error {
    let err = data
        .get("error")
        .or_else(|| data.get("response").and_then(|r| r.get("error")))
        .unwrap_or(data);
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("stream failed")
        .to_string();
    let status = err
        .get("status")
        .or_else(|| err.get("code"))
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok());
    match status {
        Some(status) => Error::remote(status, message, None),
        None => Error::runtime(message),
    }
}

/// Turns SSE input into the caller-facing event sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamingEngine;

impl StreamingEngine {
    /// Decode and map a raw SSE byte stream.
    pub fn stream(
        input: BoxStream<'static, Bytes>,
        options: StreamOptions,
    ) -> BoxStream<'static, StreamingEvent> {
        Self::stream_frames(decode_sse(input), options)
    }

    /// Map already-decoded frames.
    pub fn stream_frames(
        frames: BoxStream<'static, SseFrame>,
        options: StreamOptions,
    ) -> BoxStream<'static, StreamingEvent> {
        let state = EngineState {
            frames,
            mapper: EventMapper::new(),
            acc: TextAccumulator::new(),
            queue: VecDeque::new(),
            error: None,
            finished: false,
            options,
        };

        let events = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(ev) = st.queue.pop_front() {
                    if let Some(cb) = &st.options.on_event {
                        cb(&ev);
                    }
                    if ev.is_final {
                        st.finished = true;
                    }
                    if st.options.should_stop.as_ref().map(|p| p(&ev)).unwrap_or(false) {
                        debug!(event = ev.event_type.as_str(), "stop predicate ended stream");
                        st.finished = true;
                        st.queue.clear();
                        st.error = None;
                    }
                    return Some((Ok(ev), st));
                }
                if let Some(err) = st.error.take() {
                    st.finished = true;
                    return Some((Err(err), st));
                }
                if st.finished {
                    return None;
                }

                match st.frames.next().await {
                    Some(Ok(frame)) => {
                        for signal in st.mapper.map(&frame) {
                            st.apply(signal);
                            if st.error.is_some() || st.queue.back().map(|e| e.is_final).unwrap_or(false) {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                    None => {
                        debug!(deltas = st.acc.deltas(), "stream ended without completion event");
                        let ev = st.completion(json!({}));
                        st.queue.push_back(ev);
                    }
                }
            }
        });

        Box::pin(events)
    }
}

/// Collect a finished stream into its final completion event.
pub async fn collect_completion(
    mut events: BoxStream<'static, StreamingEvent>,
) -> Result<Option<StreamingEvent>> {
    let mut last = None;
    while let Some(ev) = events.next().await {
        let ev = ev?;
        if ev.is_final {
            last = Some(ev);
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sse(body: &str) -> BoxStream<'static, Bytes> {
        let items: Vec<Result<Bytes>> = vec![Ok(Bytes::from(body.to_string()))];
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn deltas_accumulate_then_complete() {
        let body = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n\
                    data: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n\
                    data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_1\"}}\n\n";
        let events: Vec<StreamingEvent> = StreamingEngine::stream(sse(body), StreamOptions::new())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].delta(), Some("lo"));
        assert_eq!(events[1].accumulated(), Some("Hello"));
        assert_eq!(events[2].event_type, StreamEventType::Completed);
        assert!(events[2].is_final);
        assert_eq!(events[2].accumulated(), Some("Hello"));
    }

    #[tokio::test]
    async fn cancellation_raises_before_completion() {
        let body = "data: {\"delta\":\"partial\"}\n\n\
                    event: response.canceled\ndata: {\"response_id\":\"resp_9\"}\n\n\
                    data: {\"type\":\"response.completed\"}\n\n";
        let mut events = StreamingEngine::stream(sse(body), StreamOptions::new());
        let first = events.next().await.unwrap().unwrap();
        assert!(first.is_text_delta());
        match events.next().await.unwrap() {
            Err(Error::Cancelled { response_id }) => assert_eq!(response_id.as_deref(), Some("resp_9")),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn stop_predicate_and_callback() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let options = StreamOptions::new()
            .on_event(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .should_stop(|ev| ev.accumulated().map(|t| t.len() >= 2).unwrap_or(false));
        let body = "data: {\"delta\":\"a\"}\n\ndata: {\"delta\":\"b\"}\n\ndata: {\"delta\":\"c\"}\n\n";
        let events: Vec<StreamingEvent> = StreamingEngine::stream(sse(body), options)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_frame_raises_remote_error() {
        let body = "data: {\"type\":\"error\",\"error\":{\"message\":\"overloaded\",\"code\":503}}\n\n";
        let result: Result<Vec<StreamingEvent>> =
            StreamingEngine::stream(sse(body), StreamOptions::new()).try_collect().await;
        match result {
            Err(Error::Remote { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
