//! Message delivery abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Content, SendReceipt};

/// Failure reported by a sender when delivery cannot be confirmed.
///
/// Senders wrap host automation directly, so the payload is an opaque
/// message rather than a structured error taxonomy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    /// Sender-defined failure description.
    pub message: String,
}

impl SendError {
    /// Create a send error from a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for SendError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for SendError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Delivers content to a recipient on the messaging host.
///
/// Implementations live with the host integration (automation scripts,
/// webdriver, test doubles); the scheduler only ever sees this trait.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `content` to `to`, returning delivery metadata on success.
    async fn send(&self, to: &str, content: &Content) -> Result<SendReceipt, SendError>;
}
