//! Message value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message content: text and/or attachment references.
///
/// Attachment entries are opaque references (paths or handles) resolved by
/// the sender; this crate never performs attachment I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Text body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Attachment references, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl Content {
    /// Text-only content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }

    /// Attach a reference, builder style.
    pub fn with_attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachments.push(reference.into());
        self
    }

    /// True when there is neither text nor attachments.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Delivery metadata returned by a sender on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// When the host confirmed delivery.
    pub sent_at: DateTime<Utc>,
}

/// A message observed in the host's store, fanned out to plugins via the
/// `on_new_message` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender identifier as reported by the host.
    pub from: String,
    /// Message content.
    pub content: Content,
    /// When the message was observed.
    pub received_at: DateTime<Utc>,
}
