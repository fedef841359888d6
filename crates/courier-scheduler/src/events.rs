//! Scheduler event callbacks exposed to the owning application.

use async_trait::async_trait;
use courier_core::SendReceipt;

use crate::types::{PendingJob, RecurringMessage};
use crate::SchedulerError;

/// Callbacks invoked by the scheduler as jobs fire.
///
/// All methods default to no-ops, so implementors override only what they
/// observe. Callbacks run on the scheduler's tick task; keep them short or
/// hand off to a channel.
#[async_trait]
pub trait SchedulerEvents: Send + Sync {
    /// A job's delivery succeeded. For recurring jobs this fires once per
    /// successful occurrence.
    async fn on_sent(&self, _job: &PendingJob, _receipt: &SendReceipt) {}

    /// A job's delivery failed. One-time jobs are terminal after this;
    /// recurring jobs keep their cadence.
    async fn on_error(&self, _job: &PendingJob, _error: &SchedulerError) {}

    /// A recurring job's next fire time passed its end; fires exactly once.
    async fn on_complete(&self, _job: &RecurringMessage) {}
}

/// Events implementation that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

#[async_trait]
impl SchedulerEvents for NoopEvents {}
