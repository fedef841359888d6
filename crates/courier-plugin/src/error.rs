//! Error type returned by hook implementations.

use thiserror::Error;

/// Failure reported by a single hook implementation.
///
/// Hooks are observers, so the payload is an opaque description; the
/// dispatcher collects these into [`crate::HookFailure`] reports rather
/// than propagating them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HookError {
    /// Plugin-defined failure description.
    pub message: String,
}

impl HookError {
    /// Create a hook error from a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
