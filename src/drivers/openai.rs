//! OpenAI Chat Completions 驱动：SSE 流式输出
//!
//! OpenAI chat completions driver:
//! - Body: `{model, messages: [system, user], stream: true}`.
//! - Auth: `Authorization: Bearer <key>`.
//! - Streaming: SSE `data: {...}` lines, terminated by `data: [DONE]`.
//! - Text lives at `choices[0].delta.content`.

use bytes::Bytes;
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{ConfigError, ProviderSettings};
use crate::pipeline::{Decoder, SseDecoder};
use crate::types::{ConsultRequest, MessageRole, OutputFragment};
use crate::{BoxStream, Result};

use super::{first_element, DriverRequest, ProviderDriver};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

/// One `data:` frame. Every field is optional; anything missing means "no text".
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default, rename = "choices", deserialize_with = "first_element")]
    first_choice: Option<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions driver.
#[derive(Debug, Clone)]
pub struct OpenAiDriver {
    settings: ProviderSettings,
    decoder: SseDecoder,
}

impl OpenAiDriver {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            settings,
            decoder: SseDecoder::default(),
        }
    }

    /// Extract the text of one SSE payload, if any.
    fn parse_frame(payload: &str) -> Option<OutputFragment> {
        let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(provider = "openai", error = %e, "skipping malformed frame");
                return None;
            }
        };

        chunk
            .first_choice
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(OutputFragment::from)
    }
}

impl ProviderDriver for OpenAiDriver {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn build_request(&self, request: &ConsultRequest) -> Result<DriverRequest> {
        let api_key = self.settings.require_api_key(self.provider_id())?;

        let body = serde_json::to_value(ChatCompletionRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: MessageRole::System,
                    content: request.system_instruction(),
                },
                ChatMessage {
                    role: MessageRole::User,
                    content: request.user_content(),
                },
            ],
            stream: true,
        })?;

        let url = url::Url::parse(&format!("{}{}", self.settings.base_url, CHAT_COMPLETIONS_PATH))
            .map_err(|e| ConfigError::InvalidValue {
                key: "OPENAI_BASE_URL".into(),
                value: self.settings.base_url.clone(),
                reason: e.to_string(),
            })?;

        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {}", api_key));
        headers.insert("accept".to_string(), "text/event-stream".to_string());

        Ok(DriverRequest {
            url: url.to_string(),
            headers,
            body,
        })
    }

    fn decode_stream(&self, body: BoxStream<'static, Bytes>) -> BoxStream<'static, OutputFragment> {
        let fragments = self.decoder.decode_stream(body).filter_map(|item| {
            future::ready(match item {
                Ok(payload) => Self::parse_frame(&payload).map(Ok),
                Err(e) => Some(Err(e)),
            })
        });
        Box::pin(fragments)
    }
}
