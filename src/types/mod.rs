//! 类型系统模块：与厂商无关的请求与输出片段。
//!
//! # Types Module
//!
//! Provider-agnostic shapes shared by every layer of the relay.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Visit`] | Inbound consultation body as posted by the caller |
//! | [`ConsultRequest`] | Abstract outbound prompt: system instruction + user content |
//! | [`OutputFragment`] | One normalized piece of generated text |
//! | [`MessageRole`] | Chat role used by role-based wire formats |

pub mod fragment;
pub mod message;
pub mod request;

pub use fragment::OutputFragment;
pub use message::MessageRole;
pub use request::{ConsultRequest, Visit, SYSTEM_PROMPT};
