//! Normalized output unit.

use serde::{Deserialize, Serialize};

/// One incremental piece of generated text, forwarded to the caller as soon as
/// it is decoded. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFragment {
    pub text: String,
}

impl OutputFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<String> for OutputFragment {
    fn from(text: String) -> Self {
        Self { text }
    }
}

impl From<&str> for OutputFragment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
