//! Mock upstream setup shared by integration tests

#![allow(dead_code)]

use consult_relay::config::{HttpSettings, ProviderSettings};
use consult_relay::relay::StreamRelay;
use consult_relay::transport::HttpTransport;
use consult_relay::RelayConfig;
use mockito::{Matcher, Mock, Server, ServerGuard};

pub const OPENAI_PATH: &str = "/v1/chat/completions";
pub const GEMINI_PATH: &str = r"^/v1beta/models/gemini-1\.5-flash:streamGenerateContent";

pub const OPENAI_KEY: &str = "sk-test";
pub const GEMINI_KEY: &str = "g-key";

/// Test fixture that manages a mock upstream serving both providers.
pub struct MockUpstream {
    pub server: ServerGuard,
}

impl MockUpstream {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    /// Relay configuration with both providers pointed at the mock server.
    pub fn config(&self, provider: &str) -> RelayConfig {
        let url = self.server.url();
        RelayConfig {
            provider: provider.to_string(),
            openai: ProviderSettings::new("OPENAI_API_KEY", "gpt-4o-mini", url.as_str())
                .with_api_key(OPENAI_KEY),
            gemini: ProviderSettings::new("GEMINI_API_KEY", "gemini-1.5-flash", url.as_str())
                .with_api_key(GEMINI_KEY),
            ..RelayConfig::default()
        }
    }

    /// Create a mock for an OpenAI streaming response (SSE)
    pub async fn mock_openai_sse(&mut self, frames: &[String]) -> Mock {
        let body: String = frames
            .iter()
            .map(|frame| {
                if frame.starts_with("data: ") || frame.starts_with(':') {
                    format!("{}\n\n", frame)
                } else {
                    format!("data: {}\n\n", frame)
                }
            })
            .collect();

        self.server
            .mock("POST", OPENAI_PATH)
            .match_header("authorization", format!("Bearer {}", OPENAI_KEY).as_str())
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a Gemini streaming response, one JSON object per line
    pub async fn mock_gemini_lines(&mut self, lines: &[String]) -> Mock {
        let body: String = lines.iter().map(|line| format!("{}\n", line)).collect();

        self.server
            .mock("POST", Matcher::Regex(GEMINI_PATH.to_string()))
            .match_query(Matcher::UrlEncoded("key".into(), GEMINI_KEY.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for an error response
    pub async fn mock_error(&mut self, path: Matcher, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// A catch-all mock that must never be hit
    pub async fn mock_unreachable(&mut self) -> Mock {
        self.server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await
    }
}

pub fn relay() -> StreamRelay {
    StreamRelay::new(HttpTransport::new(&HttpSettings::default()).expect("transport"))
}

/// OpenAI chunk payload carrying `content` as its delta.
pub fn openai_chunk(content: &str) -> String {
    format!(
        r#"{{"id":"chatcmpl-1","object":"chat.completion.chunk","model":"gpt-4o-mini","choices":[{{"index":0,"delta":{{"content":{}}},"finish_reason":null}}]}}"#,
        serde_json::to_string(content).unwrap()
    )
}

/// Gemini stream line carrying `text` in its first candidate.
pub fn gemini_line(text: &str) -> String {
    format!(
        r#"{{"candidates":[{{"content":{{"parts":[{{"text":{}}}],"role":"model"}},"index":0}}]}}"#,
        serde_json::to_string(text).unwrap()
    )
}

pub fn done() -> String {
    "[DONE]".to_string()
}
