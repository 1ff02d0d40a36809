//! Provider 驱动抽象层：通过 trait 实现多厂商 API 适配的动态分发
//!
//! Provider driver abstraction layer.
//! Uses `Box<dyn ProviderDriver>` for runtime polymorphism, so the relay drives
//! OpenAI and Gemini through the same two capabilities:
//!
//! - [`ProviderDriver::build_request`]: abstract request → url, headers, JSON body
//! - [`ProviderDriver::decode_stream`]: upstream bytes → lazy fragment stream
//!
//! Drivers are stateless across invocations. All per-call state (line buffer,
//! decode cursor) lives inside the stream returned by `decode_stream`.

pub mod gemini;
pub mod openai;
pub mod select;

use bytes::Bytes;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{ConsultRequest, OutputFragment};
use crate::{BoxStream, Result};

pub use gemini::GeminiDriver;
pub use openai::OpenAiDriver;
pub use select::{create_driver, select, ProviderKind};

/// Unified HTTP request representation for provider communication.
///
/// Always sent as `POST` with a JSON body.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    /// Full target URL, including any query parameters.
    pub url: String,
    /// Request headers (besides the JSON content type).
    pub headers: HashMap<String, String>,
    /// Serialized JSON request body.
    pub body: Value,
}

/// Core trait for provider-specific API adaptation.
///
/// Each upstream wire format has one concrete implementation. The trait is
/// object-safe and used through `Box<dyn ProviderDriver>`.
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    /// Stable identifier, e.g. `"openai"`.
    fn provider_id(&self) -> &str;

    /// Human-facing name used in terminal error fragments, e.g. `"OpenAI"`.
    fn display_name(&self) -> &str;

    /// Model the request will target.
    fn model(&self) -> &str;

    /// Build the provider-specific HTTP request.
    ///
    /// Fails with a configuration error when no credential is configured; in that
    /// case no upstream request may be issued.
    fn build_request(&self, request: &ConsultRequest) -> Result<DriverRequest>;

    /// Incrementally decode the provider's streaming body into fragments.
    ///
    /// Malformed frames and frames without text yield nothing and decoding
    /// continues. A transport error is forwarded once and ends the stream.
    fn decode_stream(&self, body: BoxStream<'static, Bytes>) -> BoxStream<'static, OutputFragment>;
}

/// Deserialize a JSON array field into its first element only.
///
/// Later elements are never inspected, and a first element of the wrong shape
/// becomes `None`. A field that is not an array still fails the frame.
pub(crate) fn first_element<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(items
        .and_then(|items| items.into_iter().next())
        .and_then(|first| serde_json::from_value(first).ok()))
}
