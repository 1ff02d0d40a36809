//! Gemini Generate API 驱动：实现 Google Gemini 特有的请求/响应格式转换
//!
//! Google Gemini streamGenerateContent driver. Key differences from OpenAI:
//! - Uses `contents[].parts[]` instead of `messages`; the system prompt goes to a
//!   separate top-level `systemInstruction`.
//! - No streaming flag in the body: streaming is chosen by the
//!   `:streamGenerateContent` endpoint.
//! - API key is passed as `?key=` query parameter, not in headers.
//! - Streaming emits one JSON document per line and has no sentinel like
//!   OpenAI's `[DONE]`; the stream ends when the connection closes.
//! - Text lives at `candidates[0].content.parts[0].text`.

use bytes::Bytes;
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::{ConfigError, ProviderSettings};
use crate::pipeline::{Decoder, NdjsonDecoder};
use crate::types::{ConsultRequest, OutputFragment};
use crate::{BoxStream, Result};

use super::{first_element, DriverRequest, ProviderDriver};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    system_instruction: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// One streamed `GenerateContentResponse`. Every level is optional.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default, rename = "candidates", deserialize_with = "first_element")]
    first_candidate: Option<Candidate>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default, rename = "parts", deserialize_with = "first_element")]
    first_part: Option<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Google Gemini streamGenerateContent driver.
#[derive(Debug, Clone)]
pub struct GeminiDriver {
    settings: ProviderSettings,
    decoder: NdjsonDecoder,
}

impl GeminiDriver {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            settings,
            decoder: NdjsonDecoder,
        }
    }

    /// The non-SSE endpoint renders a JSON array one element per line
    /// (`[{...}`, `,{...}`, `]`); strip that punctuation so each element parses.
    fn unwrap_array_element(line: &str) -> &str {
        line.trim()
            .trim_start_matches(|c: char| c == '[' || c == ',')
            .trim_end_matches(|c: char| c == ']' || c == ',')
            .trim()
    }

    fn parse_line(line: &str) -> Option<OutputFragment> {
        let payload = Self::unwrap_array_element(line);
        if payload.is_empty() {
            return None;
        }

        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(provider = "gemini", error = %e, "skipping malformed line");
                return None;
            }
        };

        if let Some(error) = chunk.error {
            warn!(provider = "gemini", error = %error, "upstream reported an error mid-stream");
        }

        chunk
            .first_candidate
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.first_part)
            .and_then(|part| part.text)
            .map(OutputFragment::from)
    }
}

impl ProviderDriver for GeminiDriver {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn build_request(&self, request: &ConsultRequest) -> Result<DriverRequest> {
        let api_key = self.settings.require_api_key(self.provider_id())?;

        let body = serde_json::to_value(GenerateContentRequest {
            contents: [Content {
                parts: [Part {
                    text: request.user_content(),
                }],
            }],
            system_instruction: Content {
                parts: [Part {
                    text: request.system_instruction(),
                }],
            },
        })?;

        let endpoint = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.settings.base_url, self.settings.model
        );
        let mut url = url::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidValue {
            key: "GEMINI_BASE_URL".into(),
            value: self.settings.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("key", api_key);

        Ok(DriverRequest {
            url: url.to_string(),
            headers: HashMap::new(),
            body,
        })
    }

    fn decode_stream(&self, body: BoxStream<'static, Bytes>) -> BoxStream<'static, OutputFragment> {
        let fragments = self.decoder.decode_stream(body).filter_map(|item| {
            future::ready(match item {
                Ok(line) => Self::parse_line(&line).map(Ok),
                Err(e) => Some(Err(e)),
            })
        });
        Box::pin(fragments)
    }
}
