//! Hook kinds, event payloads, and failure reports.

use std::fmt;

use courier_core::{Content, IncomingMessage, SendReceipt};

use crate::HookError;

/// The closed set of hooks a plugin may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Registry initialization (or late registration on an initialized registry).
    Init,
    /// About to deliver a message.
    BeforeSend,
    /// A message was delivered.
    AfterSend,
    /// A message was observed in the host's store.
    NewMessage,
    /// A hook or send failed somewhere in the kit.
    Error,
    /// Registry teardown.
    Destroy,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::Init => "on_init",
            HookKind::BeforeSend => "on_before_send",
            HookKind::AfterSend => "on_after_send",
            HookKind::NewMessage => "on_new_message",
            HookKind::Error => "on_error",
            HookKind::Destroy => "on_destroy",
        };
        f.write_str(name)
    }
}

/// Payload for the `BeforeSend` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    /// Recipient identifier.
    pub to: String,
    /// Content about to be delivered.
    pub content: Content,
}

/// Payload for the `AfterSend` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    /// Recipient identifier.
    pub to: String,
    /// Content that was delivered.
    pub content: Content,
    /// Delivery metadata from the sender.
    pub receipt: SendReceipt,
}

/// Where an error fanned out to the `Error` hook came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// Another plugin's hook failed.
    Hook {
        /// Name of the failing plugin.
        plugin: String,
        /// Which hook failed.
        hook: HookKind,
    },
    /// A scheduled delivery failed.
    Send {
        /// Id of the job whose send failed.
        job_id: String,
        /// Recipient of the failed send.
        to: String,
    },
}

/// Payload for the `Error` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Failure description.
    pub message: String,
    /// What produced the failure.
    pub origin: ErrorOrigin,
}

/// One event occurrence, tagged with the hook it targets.
///
/// This is the dispatch unit: each variant carries the arguments every
/// implementing plugin receives (cloned per plugin).
#[derive(Debug, Clone)]
pub enum HookEvent {
    /// Fan out `on_init`.
    Init,
    /// Fan out `on_before_send`.
    BeforeSend(SendEvent),
    /// Fan out `on_after_send`.
    AfterSend(DeliveryEvent),
    /// Fan out `on_new_message`.
    NewMessage(IncomingMessage),
    /// Fan out `on_error`.
    Error(ErrorEvent),
    /// Fan out `on_destroy`.
    Destroy,
}

impl HookEvent {
    /// Which hook this event targets.
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::Init => HookKind::Init,
            HookEvent::BeforeSend(_) => HookKind::BeforeSend,
            HookEvent::AfterSend(_) => HookKind::AfterSend,
            HookEvent::NewMessage(_) => HookKind::NewMessage,
            HookEvent::Error(_) => HookKind::Error,
            HookEvent::Destroy => HookKind::Destroy,
        }
    }
}

/// Report of one plugin's hook failure.
///
/// A value, not a fault: dispatch collects these and returns them to the
/// caller after every sibling hook has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Name of the failing plugin.
    pub plugin: String,
    /// Which hook failed.
    pub hook: HookKind,
    /// The failure itself.
    pub error: HookError,
}
