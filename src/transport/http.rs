use crate::config::HttpSettings;
use crate::drivers::DriverRequest;
use crate::{BoxStream, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Proxy;
use std::time::Duration;

/// Thin wrapper over a pooled `reqwest::Client`.
///
/// No request or read timeout is configured: the upstream controls pacing and a
/// generation may legitimately stream for minutes. Idle detection, when enabled,
/// lives in the relay.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            // Long-lived streams: keep HTTP/2 connections warm.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &settings.proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| TransportError::Other(format!("invalid proxy url: {}", e.without_url())))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue the driver's request and return the response once headers arrive.
    ///
    /// The status code is not inspected here.
    pub async fn send(&self, request: &DriverRequest) -> std::result::Result<reqwest::Response, TransportError> {
        let mut req = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        // Gemini carries its key in the query string; never let it reach an error message.
        req.send().await.map_err(|e| TransportError::Http(e.without_url()))
    }

    /// Convert a response body into the crate's unified byte stream.
    pub fn body_stream(response: reqwest::Response) -> BoxStream<'static, Bytes> {
        let byte_stream = response
            .bytes_stream()
            .map_err(|e| crate::Error::Transport(TransportError::Http(e.without_url())));
        Box::pin(byte_stream)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{}", describe(.0))]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// `reqwest` keeps the useful part ("connection refused", "dns error") in the source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
