//! Message scheduling engine for Courier.
//!
//! This crate provides an in-memory scheduler that:
//! - Maintains one-time and recurring message jobs
//! - Drives delivery through the [`courier_core::MessageSender`] abstraction
//! - Fires overdue jobs on the next tick (catch-up semantics)
//! - Supports cancel, reschedule, and export/import for persistence
//! - Routes each send through the plugin hook dispatcher when one is attached

mod error;
mod events;
mod scheduler;
mod store;
mod types;

pub use error::SchedulerError;
pub use events::{NoopEvents, SchedulerEvents};
pub use scheduler::{Scheduler, SchedulerBuilder, DEFAULT_CHECK_INTERVAL};
pub use types::{
    DeliveryStatus, JobSnapshot, PendingJob, Recurrence, RecurringMessage, RecurringRequest,
    RecurringStatus, ScheduleRequest, ScheduledMessage,
};
