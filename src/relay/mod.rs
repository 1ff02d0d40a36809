//! 流式中继：驱动一次上游调用，把解码出的片段逐个推送并刷新到调用方。
//!
//! # Stream Relay
//!
//! One invocation, strictly sequential:
//!
//! ```text
//! select driver → build_request → send → status check → decode_stream
//!                                                            │
//!                                      write + flush ←───────┘ (per fragment)
//! ```
//!
//! Every failure is scoped to the invocation and reported at most once, as a
//! single terminal fragment. Nothing is retried. A failed sink write stops the
//! loop without reading further upstream bytes.

pub mod sink;

pub use sink::{encode_event, ChannelSink, FragmentSink, MemorySink, SseWriter};

use bytes::Bytes;
use futures::{stream, StreamExt};
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::drivers::{select, ProviderDriver};
use crate::transport::HttpTransport;
use crate::types::{ConsultRequest, OutputFragment};
use crate::{BoxStream, Error, Result};

/// Bytes of an upstream error body kept for logging.
const ERROR_BODY_LOG_LIMIT: usize = 512;

/// Silence allowed while reading an error body when no idle timeout is configured.
const ERROR_BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How an invocation ended.
#[derive(Debug)]
pub enum RelayStatus {
    /// The upstream stream ended (done marker or connection close).
    Completed,
    /// A terminal fragment describing the error was written.
    Failed(Error),
    /// The sink stopped accepting writes; the caller is gone.
    SinkClosed,
}

/// Terminal status of one relay invocation.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Content fragments delivered, not counting a terminal error fragment.
    pub fragments: usize,
    pub status: RelayStatus,
}

impl RelayOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RelayStatus::Completed)
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            RelayStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Drives provider drivers against their upstreams.
///
/// Holds no per-invocation state, so one instance serves any number of
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    transport: HttpTransport,
    idle_timeout: Option<Duration>,
}

impl StreamRelay {
    pub fn new(transport: HttpTransport) -> Self {
        Self {
            transport,
            idle_timeout: None,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(&config.http)?).with_idle_timeout(config.idle_timeout))
    }

    /// Abort an invocation when the upstream sends nothing for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Select the configured provider and relay `request` to `sink`.
    ///
    /// An unknown provider name produces one terminal fragment and no upstream call.
    pub async fn consult(
        &self,
        config: &RelayConfig,
        request: &ConsultRequest,
        sink: &mut dyn FragmentSink,
    ) -> RelayOutcome {
        match select(&config.provider, config) {
            Ok(driver) => self.run(driver.as_ref(), request, sink).await,
            Err(e) => {
                warn!(provider = %config.provider, "unknown provider");
                fail(sink, 0, e.into()).await
            }
        }
    }

    /// Relay one request through `driver`.
    pub async fn run(
        &self,
        driver: &dyn ProviderDriver,
        request: &ConsultRequest,
        sink: &mut dyn FragmentSink,
    ) -> RelayOutcome {
        let span = info_span!(
            "relay",
            request_id = %Uuid::new_v4(),
            provider = driver.provider_id(),
            model = driver.model(),
        );
        self.drive(driver, request, sink).instrument(span).await
    }

    async fn drive(
        &self,
        driver: &dyn ProviderDriver,
        request: &ConsultRequest,
        sink: &mut dyn FragmentSink,
    ) -> RelayOutcome {
        let upstream = match driver.build_request(request) {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(error = %e, "cannot build upstream request");
                return fail(sink, 0, e).await;
            }
        };

        info!("opening upstream stream");
        let response = match self.transport.send(&upstream).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "upstream transport failure");
                return fail(sink, 0, e.into()).await;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let mut err = Error::UpstreamStatus {
                provider: driver.display_name().to_string(),
                status: status.as_u16(),
                body: None,
            };
            if !report(sink, &err).await {
                return RelayOutcome {
                    fragments: 0,
                    status: RelayStatus::SinkClosed,
                };
            }

            let limit = self.idle_timeout.unwrap_or(ERROR_BODY_READ_TIMEOUT);
            let logged = read_error_body(response, limit).await;
            warn!(
                http_status = status.as_u16(),
                body = logged.as_deref().unwrap_or(""),
                "upstream returned an error status"
            );
            if let Error::UpstreamStatus { body, .. } = &mut err {
                *body = logged;
            }
            return RelayOutcome {
                fragments: 0,
                status: RelayStatus::Failed(err),
            };
        }

        let mut body = HttpTransport::body_stream(response);
        if let Some(limit) = self.idle_timeout {
            body = idle_guard(body, limit);
        }

        let mut fragments = driver.decode_stream(body);
        let mut delivered = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    if let Err(e) = emit(sink, &fragment).await {
                        debug!(error = %e, delivered, "sink closed, abandoning upstream stream");
                        return RelayOutcome {
                            fragments: delivered,
                            status: RelayStatus::SinkClosed,
                        };
                    }
                    delivered += 1;
                }
                Err(e) => {
                    warn!(error = %e, delivered, "upstream stream failed");
                    return fail(sink, delivered, e).await;
                }
            }
        }

        info!(fragments = delivered, "upstream stream finished");
        RelayOutcome {
            fragments: delivered,
            status: RelayStatus::Completed,
        }
    }
}

async fn emit(sink: &mut dyn FragmentSink, fragment: &OutputFragment) -> Result<()> {
    sink.write(fragment).await?;
    sink.flush().await
}

/// Write the terminal fragment for `err`. False when the sink is gone.
async fn report(sink: &mut dyn FragmentSink, err: &Error) -> bool {
    let terminal = OutputFragment::new(err.terminal_message());
    emit(sink, &terminal).await.is_ok()
}

/// Write the terminal fragment for `err` and end the invocation.
async fn fail(sink: &mut dyn FragmentSink, delivered: usize, err: Error) -> RelayOutcome {
    let status = if report(sink, &err).await {
        RelayStatus::Failed(err)
    } else {
        RelayStatus::SinkClosed
    };
    RelayOutcome {
        fragments: delivered,
        status,
    }
}

/// Read at most [`ERROR_BODY_LOG_LIMIT`] bytes of an error response, giving up
/// once the body is silent for `limit`.
async fn read_error_body(response: reqwest::Response, limit: Duration) -> Option<String> {
    let mut body = idle_guard(HttpTransport::body_stream(response), limit);
    let mut buf = Vec::with_capacity(ERROR_BODY_LOG_LIMIT);
    while buf.len() < ERROR_BODY_LOG_LIMIT {
        match body.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            Some(Err(e)) => {
                debug!(error = %e, "stopped reading error body");
                break;
            }
            None => break,
        }
    }
    if buf.is_empty() {
        return None;
    }
    buf.truncate(ERROR_BODY_LOG_LIMIT);
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Fail the byte stream with [`Error::IdleTimeout`] when no chunk arrives within `limit`.
fn idle_guard(input: BoxStream<'static, Bytes>, limit: Duration) -> BoxStream<'static, Bytes> {
    let guarded = stream::unfold(Some(input), move |state| async move {
        let mut input = match state {
            Some(input) => input,
            None => return None,
        };
        match tokio::time::timeout(limit, input.next()).await {
            Ok(Some(item)) => Some((item, Some(input))),
            Ok(None) => None,
            Err(_) => Some((Err(Error::IdleTimeout(limit)), None)),
        }
    });
    Box::pin(guarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpSettings, ProviderSettings};
    use crate::drivers::{DriverRequest, OpenAiDriver};
    use crate::pipeline::{Decoder, NdjsonDecoder};

    fn relay() -> StreamRelay {
        StreamRelay::new(HttpTransport::new(&HttpSettings::default()).unwrap())
    }

    /// Driver stub that must never reach the network.
    #[derive(Debug)]
    struct NoCredentialDriver;

    impl ProviderDriver for NoCredentialDriver {
        fn provider_id(&self) -> &str {
            "stub"
        }
        fn display_name(&self) -> &str {
            "Stub"
        }
        fn model(&self) -> &str {
            "stub-1"
        }
        fn build_request(&self, _request: &ConsultRequest) -> Result<DriverRequest> {
            Err(crate::config::ConfigError::MissingCredential {
                provider: "stub".into(),
                env_var: "STUB_API_KEY".into(),
            }
            .into())
        }
        fn decode_stream(&self, body: BoxStream<'static, Bytes>) -> BoxStream<'static, OutputFragment> {
            Box::pin(NdjsonDecoder.decode_stream(body).map(|r| r.map(OutputFragment::from)))
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_writes_one_fragment() {
        let config = RelayConfig {
            provider: "mistral".into(),
            ..RelayConfig::default()
        };
        let mut sink = MemorySink::new();
        let outcome = relay()
            .consult(&config, &ConsultRequest::new("hi"), &mut sink)
            .await;

        assert_eq!(sink.fragments(), ["❌ Invalid LLM_PROVIDER: mistral".to_string()]);
        assert_eq!(sink.flushes(), 1);
        assert_eq!(outcome.fragments, 0);
        assert!(matches!(outcome.error(), Some(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_credential_writes_one_fragment() {
        let mut sink = MemorySink::new();
        let outcome = relay()
            .run(&NoCredentialDriver, &ConsultRequest::new("hi"), &mut sink)
            .await;
        assert_eq!(sink.fragments(), ["❌ STUB_API_KEY not set".to_string()]);
        assert!(!outcome.is_completed());
    }

    #[tokio::test]
    async fn test_transport_failure_writes_one_fragment() {
        // Reserve a port, then free it so the connection is refused.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let settings = ProviderSettings::new(
            "OPENAI_API_KEY",
            "gpt-4o-mini",
            format!("http://127.0.0.1:{}", port),
        )
        .with_api_key("sk-test");
        let mut sink = MemorySink::new();
        let outcome = relay()
            .run(&OpenAiDriver::new(settings), &ConsultRequest::new("hi"), &mut sink)
            .await;

        assert_eq!(sink.fragments().len(), 1);
        assert!(sink.fragments()[0].starts_with("❌ Error: "));
        assert!(matches!(outcome.error(), Some(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_idle_guard_times_out_silent_stream() {
        let silent: BoxStream<'static, Bytes> = Box::pin(
            stream::iter(vec![Ok::<Bytes, Error>(Bytes::from_static(b"{}\n"))])
                .chain(stream::pending()),
        );
        let items: Vec<_> = idle_guard(silent, Duration::from_millis(20)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::IdleTimeout(_))));
    }

    #[tokio::test]
    async fn test_idle_guard_passes_through_finished_stream() {
        let body: BoxStream<'static, Bytes> = Box::pin(stream::iter(vec![
            Ok::<Bytes, Error>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]));
        let items: Vec<_> = idle_guard(body, Duration::from_secs(5)).collect().await;
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_outcome_helpers() {
        let ok = RelayOutcome {
            fragments: 2,
            status: RelayStatus::Completed,
        };
        assert!(ok.is_completed());
        assert!(ok.error().is_none());
    }
}
