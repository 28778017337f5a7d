//! SSE decoder (Bytes -> frames).
//!
//! Splits the byte stream into lines, groups `event:`/`data:` fields into frames at each
//! blank line and stops on the `[DONE]` sentinel. Chunk boundaries may fall anywhere,
//! including inside a UTF-8 sequence or between `\r` and `\n`.

use crate::BoxStream;
use bytes::Bytes;
use futures::{stream, StreamExt};

pub const DONE_SIGNAL: &str = "[DONE]";

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, when the server sent one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseFrame {
    pub fn new(event: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            event: event.map(|e| e.to_string()),
            data: data.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_SIGNAL
    }
}

#[derive(Default)]
struct FrameBuilder {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameBuilder {
    /// Feed one line; returns a frame when the line terminates one.
    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry carry nothing we use
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

struct DecodeState {
    input: BoxStream<'static, Bytes>,
    buf: Vec<u8>,
    frame: FrameBuilder,
    eof: bool,
}

/// Decode a byte stream into SSE frames. The `[DONE]` sentinel ends the stream without
/// being yielded; transport errors are passed through.
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, SseFrame> {
    let state = DecodeState {
        input,
        buf: Vec::new(),
        frame: FrameBuilder::default(),
        eof: false,
    };

    let frames = stream::unfold(Some(state), |state| async move {
        let mut st = state?;
        loop {
            if let Some(idx) = st.buf.iter().position(|b| *b == b'\n') {
                let mut raw: Vec<u8> = st.buf.drain(..=idx).collect();
                raw.pop();
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                let line = String::from_utf8_lossy(&raw);
                if let Some(frame) = st.frame.line(&line) {
                    if frame.is_done() {
                        return None;
                    }
                    return Some((Ok(frame), Some(st)));
                }
                continue;
            }

            if st.eof {
                // trailing line without newline, then whatever frame is still open
                if !st.buf.is_empty() {
                    let raw = std::mem::take(&mut st.buf);
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim_end_matches('\r');
                    if let Some(frame) = st.frame.line(line) {
                        if frame.is_done() {
                            return None;
                        }
                        return Some((Ok(frame), Some(st)));
                    }
                }
                let frame = st.frame.dispatch()?;
                if frame.is_done() {
                    return None;
                }
                return Some((Ok(frame), None));
            }

            match st.input.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => return Some((Err(e), None)),
                None => st.eof = true,
            }
        }
    });

    Box::pin(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn chunks(parts: &[&str]) -> BoxStream<'static, Bytes> {
        let items: Vec<crate::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(parts: &[&str]) -> Vec<SseFrame> {
        decode_sse(chunks(parts)).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn frames_split_across_chunks() {
        let frames = collect(&[
            "event: response.output_text.delta\r\nda",
            "ta: {\"delta\":\"Hel\"}\r\n\r\n: keep-alive\n\n",
            "data: {\"delta\":\"lo\"}\n\ndata: [DONE]\n\ndata: {\"ignored\":true}\n\n",
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                SseFrame::new(Some("response.output_text.delta"), "{\"delta\":\"Hel\"}"),
                SseFrame::new(None, "{\"delta\":\"lo\"}"),
            ]
        );
    }

    #[tokio::test]
    async fn multi_line_data_and_unterminated_tail() {
        let frames = collect(&["data: first\ndata: second\n\ndata:{\"x\":1}"]).await;
        assert_eq!(frames[0].data, "first\nsecond");
        assert_eq!(frames[1].data, "{\"x\":1}");
    }

    #[tokio::test]
    async fn utf8_split_inside_a_character() {
        let bytes = "data: héllo\n\n".as_bytes().to_vec();
        let (a, b) = bytes.split_at(8);
        let items: Vec<crate::Result<Bytes>> =
            vec![Ok(Bytes::from(a.to_vec())), Ok(Bytes::from(b.to_vec()))];
        let frames: Vec<SseFrame> = decode_sse(Box::pin(stream::iter(items)))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(frames[0].data, "héllo");
    }
}
