//! Plugin records and their typed hook slots.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use courier_core::IncomingMessage;

use crate::hooks::{DeliveryEvent, ErrorEvent, HookKind, SendEvent};
use crate::{HookError, HookEvent};

/// Boxed future returned by every hook invocation.
pub(crate) type HookFuture = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send>>;

type LifecycleHook = Arc<dyn Fn() -> HookFuture + Send + Sync>;
type SendHook = Arc<dyn Fn(SendEvent) -> HookFuture + Send + Sync>;
type DeliveryHook = Arc<dyn Fn(DeliveryEvent) -> HookFuture + Send + Sync>;
type MessageHook = Arc<dyn Fn(IncomingMessage) -> HookFuture + Send + Sync>;
type ErrorHook = Arc<dyn Fn(ErrorEvent) -> HookFuture + Send + Sync>;

/// One optional, typed slot per hook kind.
///
/// Hook lookup is a closed tagged dispatch: one field per kind, matched
/// explicitly in [`Plugin::invoke`], never name-based reflection.
#[derive(Clone, Default)]
pub(crate) struct HookSet {
    pub(crate) on_init: Option<LifecycleHook>,
    pub(crate) on_before_send: Option<SendHook>,
    pub(crate) on_after_send: Option<DeliveryHook>,
    pub(crate) on_new_message: Option<MessageHook>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) on_destroy: Option<LifecycleHook>,
}

/// An extension observing kit lifecycle events.
///
/// Built once via the consuming builder methods and treated as immutable
/// after registration. Hooks may be synchronous or asynchronous; either way
/// the closure returns a future, so a synchronous hook is just
/// `|event| async move { ... }` with no awaits inside.
///
/// ```no_run
/// use courier_plugin::Plugin;
///
/// let plugin = Plugin::new("greeter")
///     .version("0.1.0")
///     .on_new_message(|msg| async move {
///         println!("saw a message from {}", msg.from);
///         Ok(())
///     });
/// ```
#[derive(Clone)]
pub struct Plugin {
    /// Unique name within a registry.
    pub name: String,
    /// Optional semantic version.
    pub version: Option<String>,
    /// Optional human-readable description.
    pub description: Option<String>,
    pub(crate) hooks: HookSet,
}

impl Plugin {
    /// Create a plugin with no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            hooks: HookSet::default(),
        }
    }

    /// Set the plugin version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the plugin description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Install the `Init` hook.
    pub fn on_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_init = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    /// Install the `BeforeSend` hook.
    pub fn on_before_send<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SendEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_before_send = Some(Arc::new(move |event| Box::pin(hook(event))));
        self
    }

    /// Install the `AfterSend` hook.
    pub fn on_after_send<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(DeliveryEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_after_send = Some(Arc::new(move |event| Box::pin(hook(event))));
        self
    }

    /// Install the `NewMessage` hook.
    pub fn on_new_message<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(IncomingMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_new_message = Some(Arc::new(move |message| Box::pin(hook(message))));
        self
    }

    /// Install the `Error` hook.
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ErrorEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_error = Some(Arc::new(move |event| Box::pin(hook(event))));
        self
    }

    /// Install the `Destroy` hook.
    pub fn on_destroy<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.hooks.on_destroy = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    /// Whether this plugin implements the given hook.
    pub fn implements(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::Init => self.hooks.on_init.is_some(),
            HookKind::BeforeSend => self.hooks.on_before_send.is_some(),
            HookKind::AfterSend => self.hooks.on_after_send.is_some(),
            HookKind::NewMessage => self.hooks.on_new_message.is_some(),
            HookKind::Error => self.hooks.on_error.is_some(),
            HookKind::Destroy => self.hooks.on_destroy.is_some(),
        }
    }

    /// Build the invocation future for `event`, or `None` when the hook is
    /// not implemented. Constructing the future does not run the hook.
    pub(crate) fn invoke(&self, event: &HookEvent) -> Option<HookFuture> {
        match event {
            HookEvent::Init => self.hooks.on_init.as_ref().map(|hook| hook()),
            HookEvent::BeforeSend(event) => self
                .hooks
                .on_before_send
                .as_ref()
                .map(|hook| hook(event.clone())),
            HookEvent::AfterSend(event) => self
                .hooks
                .on_after_send
                .as_ref()
                .map(|hook| hook(event.clone())),
            HookEvent::NewMessage(message) => self
                .hooks
                .on_new_message
                .as_ref()
                .map(|hook| hook(message.clone())),
            HookEvent::Error(event) => self.hooks.on_error.as_ref().map(|hook| hook(event.clone())),
            HookEvent::Destroy => self.hooks.on_destroy.as_ref().map(|hook| hook()),
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
