//! Lifecycle-aware plugin hook dispatcher for Courier.
//!
//! This crate provides a pub/sub mechanism letting independent extensions
//! observe send/receive/init/destroy events:
//! - Plugins declare a sparse set of typed hook slots
//! - Dispatch fans a hook out to all implementing plugins concurrently
//! - One plugin's failure (error or panic) never affects its siblings
//! - Failures are collected as values and echoed to the `Error` hook

mod error;
mod hooks;
mod plugin;
mod registry;

pub use error::HookError;
pub use hooks::{DeliveryEvent, ErrorEvent, ErrorOrigin, HookEvent, HookFailure, HookKind, SendEvent};
pub use plugin::Plugin;
pub use registry::PluginRegistry;
