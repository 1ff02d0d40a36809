//! # consult-relay
//!
//! 流式问诊中继：接收一次请求，转发给上游文本生成服务，并以统一的 SSE 事件流实时回传。
//!
//! Streaming consultation relay: accepts one consultation request, forwards it to
//! one of several interchangeable upstream text-generation providers, and
//! republishes the provider's incremental output as a normalized,
//! continuously-flushed Server-Sent Events stream.
//!
//! ## Overview
//!
//! The core is a streaming protocol adapter:
//!
//! - **Selection**: [`drivers::select`] maps the configured provider name to a driver
//! - **Translation**: each [`drivers::ProviderDriver`] builds its own request shape
//! - **Incremental decode**: each driver decodes its own wire format as bytes arrive
//!   (SSE `data:` lines for OpenAI, newline-delimited JSON for Gemini)
//! - **Unified output**: [`relay::StreamRelay`] writes every [`OutputFragment`] to a
//!   [`relay::FragmentSink`] and flushes it immediately
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consult_relay::relay::{MemorySink, StreamRelay};
//! use consult_relay::{ConsultRequest, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> consult_relay::Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     let relay = StreamRelay::from_config(&config)?;
//!
//!     let mut sink = MemorySink::new();
//!     let outcome = relay
//!         .consult(&config, &ConsultRequest::new("Patient reports a mild headache."), &mut sink)
//!         .await;
//!     println!("{} fragments: {:?}", outcome.fragments, sink.fragments());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Provider-agnostic request and fragment types |
//! | [`config`] | Explicit process configuration |
//! | [`pipeline`] | Incremental SSE / NDJSON decoders |
//! | [`drivers`] | Provider drivers and selection |
//! | [`transport`] | Outbound HTTP |
//! | [`relay`] | Stream relay and output sinks |
//! | `server` | Inbound HTTP surface (feature `server`) |

pub mod config;
pub mod drivers;
pub mod pipeline;
pub mod relay;
pub mod transport;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

pub use config::{ConfigError, RelayConfig};
pub use relay::{FragmentSink, RelayOutcome, RelayStatus, StreamRelay};
pub use types::{ConsultRequest, OutputFragment, Visit};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for streaming stages
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::Error;
