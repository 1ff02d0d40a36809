//! Chat roles for role-based wire formats.

use serde::{Deserialize, Serialize};

/// Role of a message in a chat-style request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}
