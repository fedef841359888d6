//! Plugin registry and concurrent hook dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::hooks::{ErrorEvent, ErrorOrigin, HookFailure, HookKind};
use crate::plugin::HookFuture;
use crate::{HookError, HookEvent, Plugin};

struct RegistryInner {
    /// Ordered plugin list; registration order is preserved.
    plugins: RwLock<Vec<Plugin>>,
    /// Set by `init`, cleared by `destroy`. Dispatch is a no-op while unset.
    initialized: AtomicBool,
}

/// Ordered registry of plugins with concurrent, failure-isolated hook
/// dispatch.
///
/// The registry is a cheap handle (`Arc` inner); clones share the same
/// plugin list. The list is mutated only through [`register`](Self::register)
/// and [`destroy`](Self::destroy).
///
/// Dispatch ordering: plugins for one event run concurrently with no
/// ordering guarantee between them, but `dispatch` is awaited by its caller,
/// so successive dispatches of the same hook never overlap.
#[derive(Clone)]
pub struct PluginRegistry {
    inner: Arc<RegistryInner>,
}

impl PluginRegistry {
    /// Create an empty, uninitialized registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                plugins: RwLock::new(Vec::new()),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Append a plugin; chainable.
    ///
    /// A duplicate name is skipped with a warning (names are unique within a
    /// registry). If the registry is already initialized the plugin's `Init`
    /// hook fires asynchronously on a spawned task; registration never waits
    /// for it, and a late-init failure is echoed to the `Error` hook rather
    /// than surfaced here. Late registration therefore requires a running
    /// tokio runtime.
    pub fn register(&self, plugin: Plugin) -> &Self {
        let late_init = {
            let mut plugins = self.inner.plugins.write().expect("plugin list poisoned");
            if plugins.iter().any(|existing| existing.name == plugin.name) {
                warn!(name = %plugin.name, "duplicate plugin name, skipping registration");
                return self;
            }

            let name = plugin.name.clone();
            let init_due = self.inner.initialized.load(Ordering::SeqCst);
            let future = if init_due {
                plugin.invoke(&HookEvent::Init)
            } else {
                None
            };
            debug!(name = %name, late_init = future.is_some(), "registered plugin");
            plugins.push(plugin);
            future.map(|future| (name, future))
        };

        if let Some((name, future)) = late_init {
            let registry = self.clone();
            tokio::spawn(async move {
                if let Err(error) = future.await {
                    warn!(plugin = %name, error = %error, "late init hook failed");
                    registry
                        .echo_failure(&HookFailure {
                            plugin: name,
                            hook: HookKind::Init,
                            error,
                        })
                        .await;
                }
            });
        }

        self
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.inner.plugins.read().expect("plugin list poisoned").len()
    }

    /// True when no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `init` has run (and `destroy` has not).
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Initialize the registry: fan out `Init` to every plugin concurrently.
    ///
    /// Idempotent; a second call returns an empty failure list without
    /// re-firing hooks.
    pub async fn init(&self) -> Vec<HookFailure> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        info!(plugins = self.len(), "initializing plugin registry");
        self.dispatch_unchecked(HookEvent::Init).await
    }

    /// Tear down the registry: fan out `Destroy`, then clear the plugin list
    /// and reset the initialized flag.
    ///
    /// Idempotent; after the first call every dispatch on this registry is a
    /// no-op returning an empty failure list, and no further hooks fire.
    pub async fn destroy(&self) -> Vec<HookFailure> {
        let failures = self.dispatch_unchecked(HookEvent::Destroy).await;
        self.inner.initialized.store(false, Ordering::SeqCst);
        let drained = {
            let mut plugins = self.inner.plugins.write().expect("plugin list poisoned");
            std::mem::take(&mut *plugins).len()
        };
        if drained > 0 {
            info!(plugins = drained, "destroyed plugin registry");
        }
        failures
    }

    /// Invoke the event's hook on every plugin implementing it, concurrently,
    /// and collect per-plugin failures.
    ///
    /// Requires a prior [`init`](Self::init); before init (or after
    /// [`destroy`](Self::destroy)) this returns an empty list without
    /// touching any plugin. With no implementing plugins it returns empty
    /// without spawning anything.
    ///
    /// Failures for any hook other than `Error` are additionally echoed to
    /// the `Error` hook, once per failing plugin; failures of the `Error`
    /// hook itself are never echoed, and failures raised while echoing are
    /// logged and swallowed.
    pub async fn dispatch(&self, event: HookEvent) -> Vec<HookFailure> {
        if !self.inner.initialized.load(Ordering::SeqCst) {
            return Vec::new();
        }
        self.dispatch_unchecked(event).await
    }

    async fn dispatch_unchecked(&self, event: HookEvent) -> Vec<HookFailure> {
        let kind = event.kind();
        let handlers = self.handlers_for(&event);
        if handlers.is_empty() {
            return Vec::new();
        }

        let failures = Self::fan_out(kind, handlers).await;

        if kind != HookKind::Error && !failures.is_empty() {
            for failure in &failures {
                self.echo_failure(failure).await;
            }
        }

        failures
    }

    /// Re-dispatch one failure to the `Error` hook, swallowing any failures
    /// the error hooks themselves produce.
    async fn echo_failure(&self, failure: &HookFailure) {
        let echo = HookEvent::Error(ErrorEvent {
            message: failure.error.to_string(),
            origin: ErrorOrigin::Hook {
                plugin: failure.plugin.clone(),
                hook: failure.hook,
            },
        });
        let handlers = self.handlers_for(&echo);
        if handlers.is_empty() {
            return;
        }
        for dropped in Self::fan_out(HookKind::Error, handlers).await {
            warn!(
                plugin = %dropped.plugin,
                error = %dropped.error,
                "error hook failed while handling another failure, dropping"
            );
        }
    }

    /// Snapshot the invocation futures for `event` in registration order.
    ///
    /// Building a future does not run the hook, so this is safe under the
    /// list lock; the lock is released before anything is polled.
    fn handlers_for(&self, event: &HookEvent) -> Vec<(String, HookFuture)> {
        let plugins = self.inner.plugins.read().expect("plugin list poisoned");
        plugins
            .iter()
            .filter_map(|plugin| {
                plugin
                    .invoke(event)
                    .map(|future| (plugin.name.clone(), future))
            })
            .collect()
    }

    /// Spawn every handler on a `JoinSet`, wait for all to settle, and
    /// collect failures. A panicking hook is reported like an erring one;
    /// no sibling is ever cancelled.
    async fn fan_out(kind: HookKind, handlers: Vec<(String, HookFuture)>) -> Vec<HookFailure> {
        let mut tasks = JoinSet::new();
        let mut names: HashMap<tokio::task::Id, String> = HashMap::with_capacity(handlers.len());

        for (name, future) in handlers {
            let handle = tasks.spawn(future);
            names.insert(handle.id(), name);
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(error))) => {
                    let plugin = names.remove(&id).unwrap_or_default();
                    debug!(plugin = %plugin, hook = %kind, error = %error, "hook failed");
                    failures.push(HookFailure {
                        plugin,
                        hook: kind,
                        error,
                    });
                }
                Err(join_error) => {
                    let plugin = names.remove(&join_error.id()).unwrap_or_default();
                    warn!(plugin = %plugin, hook = %kind, error = %join_error, "hook task panicked");
                    failures.push(HookFailure {
                        plugin,
                        hook: kind,
                        error: HookError::new(format!("hook panicked: {join_error}")),
                    });
                }
            }
        }

        failures
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
