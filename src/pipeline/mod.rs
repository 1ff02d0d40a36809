//! 流水线模块：把上游字节流增量解码为逐帧载荷。
//!
//! # Streaming Decode Layer
//!
//! Decoders turn an upstream byte stream into a lazy stream of frame payloads
//! (one JSON document each) as bytes arrive. They only know about *wire formats*;
//! what a payload means is decided by the provider driver that owns the decoder.
//!
//! ```text
//! HTTP body → lines() → SseDecoder / NdjsonDecoder → payload strings → driver
//!              │              │                           │
//!         CR/LF framing   `data: ` prefix,           typed frame parse,
//!         across chunks   `[DONE]` stop              fragment extraction
//! ```
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`decode::lines`] | Incremental line framing over arbitrary chunk boundaries |
//! | [`decode::SseDecoder`] | Server-Sent Events `data:` lines with a done signal |
//! | [`decode::NdjsonDecoder`] | One JSON document per line, ends on connection close |

pub mod decode;


pub use decode::{lines, NdjsonDecoder, SseDecoder};

use crate::BoxStream;
use bytes::Bytes;

/// Decoder trait for stream decoding.
pub trait Decoder: Send + Sync {
    /// Decode a byte stream into frame payloads.
    ///
    /// The returned stream is finite and not restartable. An `Err` item is
    /// terminal: the stream ends right after it.
    fn decode_stream(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, String>;
}
