use crate::config::ConfigError;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the relay.
///
/// Every variant is scoped to a single invocation. Once streaming headers are
/// committed an error can no longer change the HTTP status, so the relay renders
/// it with [`Error::terminal_message`] as the last fragment of the stream.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Upstream error: {provider} returned HTTP {status}")]
    UpstreamStatus {
        /// Display name of the provider (e.g. "OpenAI").
        provider: String,
        status: u16,
        /// Response body, truncated, for logs only.
        body: Option<String>,
    },

    #[error("Upstream idle for more than {}s", .0.as_secs())]
    IdleTimeout(Duration),

    #[error("Output sink closed")]
    SinkClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Text of the single terminal fragment written in place of further content.
    pub fn terminal_message(&self) -> String {
        match self {
            Error::Config(e) => format!("❌ {}", e),
            Error::UpstreamStatus {
                provider, status, ..
            } => format!("❌ {} API error: {}", provider, status),
            Error::IdleTimeout(after) => {
                format!("❌ Error: upstream idle for more than {}s", after.as_secs())
            }
            Error::Transport(e) => format!("❌ Error: {}", e),
            other => format!("❌ Error: {}", other),
        }
    }

    /// True when the failure is the caller going away rather than the upstream.
    pub fn is_sink_closed(&self) -> bool {
        matches!(self, Error::SinkClosed)
    }
}
