//! Streaming decoders (Bytes -> frame payloads)
//!
//! Provider semantics are kept out of this module: it decodes *formats*
//! (SSE, NDJSON) and leaves interpretation of each payload to the driver.

use crate::pipeline::Decoder;
use crate::BoxStream;
use bytes::Bytes;
use futures::{future, stream, StreamExt};

/// Split a byte stream into lines as bytes arrive.
///
/// - `\n` and `\r\n` terminators are both accepted and stripped.
/// - Bytes are buffered until a full line is present, so multi-byte UTF-8
///   sequences split across chunks decode correctly; invalid UTF-8 is replaced.
/// - A trailing line without terminator is emitted at end of stream.
/// - An upstream error is forwarded once and ends the stream.
pub fn lines(input: BoxStream<'static, Bytes>) -> BoxStream<'static, String> {
    let stream = stream::unfold(
        Some((input, Vec::<u8>::new())),
        |state| async move {
            let (mut input, mut buf) = match state {
                Some(state) => state,
                None => return None,
            };
            loop {
                if let Some(idx) = buf.iter().position(|b| *b == b'\n') {
                    let mut line: Vec<u8> = buf.drain(..=idx).collect();
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    let text = String::from_utf8_lossy(&line).into_owned();
                    return Some((Ok(text), Some((input, buf))));
                }

                // Need more data.
                match input.next().await {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        if buf.is_empty() {
                            return None;
                        }
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                        let text = String::from_utf8_lossy(&buf).into_owned();
                        return Some((Ok(text), None));
                    }
                }
            }
        },
    );

    Box::pin(stream)
}

/// A line-oriented SSE decoder:
/// - only lines starting with `prefix` (default `"data: "`) are relevant
/// - everything else (comments, `event:`, blank separators) is skipped
/// - a payload equal to `done_signal` (default `"[DONE]"`) ends the stream
#[derive(Debug, Clone)]
pub struct SseDecoder {
    prefix: String,
    done_signal: String,
}

impl SseDecoder {
    pub fn new(prefix: Option<String>, done_signal: Option<String>) -> Self {
        Self {
            prefix: prefix.unwrap_or_else(|| "data: ".to_string()),
            done_signal: done_signal.unwrap_or_else(|| "[DONE]".to_string()),
        }
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Decoder for SseDecoder {
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, String> {
        let prefix = self.prefix.clone();
        let done_signal = self.done_signal.clone();

        let payloads = lines(input)
            .filter_map(move |item| {
                future::ready(match item {
                    Ok(line) => line
                        .strip_prefix(prefix.as_str())
                        .map(|payload| Ok(payload.to_string())),
                    Err(e) => Some(Err(e)),
                })
            })
            .take_while(move |item| {
                let done = matches!(item, Ok(payload) if *payload == done_signal);
                future::ready(!done)
            });

        Box::pin(payloads)
    }
}

/// NDJSON / JSONL decoder (one JSON document per line).
///
/// There is no terminal marker: the stream ends when the byte stream does.
/// Blank lines are skipped; nothing is parsed here.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDecoder;

impl Decoder for NdjsonDecoder {
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, String> {
        let payloads = lines(input).filter_map(|item| {
            future::ready(match item {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(Ok(trimmed.to_string()))
                    }
                }
                Err(e) => Some(Err(e)),
            })
        });

        Box::pin(payloads)
    }
}
