//! Scheduler types.

use chrono::{DateTime, Duration, Utc};
use courier_core::Content;
use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// Status of a one-time message job.
///
/// Transitions only `Pending -> {Sent, Failed, Cancelled}`; terminal states
/// are never overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for its send time.
    #[default]
    Pending,
    /// Delivered successfully.
    Sent,
    /// Delivery failed; one-time jobs do not retry.
    Failed,
    /// Cancelled before delivery.
    Cancelled,
}

impl DeliveryStatus {
    /// True for every state except `Pending`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

/// Status of a recurring message job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    /// Firing on its cadence.
    #[default]
    Active,
    /// Ran past its end time.
    Completed,
    /// Cancelled while active.
    Cancelled,
}

impl RecurringStatus {
    /// True for every state except `Active`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecurringStatus::Active)
    }
}

/// Cadence of a recurring job.
///
/// Every cadence is a fixed-duration addition; there is no calendar
/// arithmetic, so `Daily` shifts wall-clock time across a daylight-saving
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every 24 hours.
    Daily,
    /// Every hour.
    Hourly,
    /// Every fixed number of milliseconds.
    Every {
        /// Period in milliseconds; must be positive.
        millis: i64,
    },
}

impl Recurrence {
    /// Explicit millisecond cadence, rejecting non-positive periods.
    pub fn every(millis: i64) -> Result<Self, SchedulerError> {
        let recurrence = Recurrence::Every { millis };
        recurrence.validate()?;
        Ok(recurrence)
    }

    /// Reject non-positive explicit periods.
    ///
    /// Needed separately from [`every`](Self::every) because `Every` can
    /// also arrive through deserialization.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match self {
            Recurrence::Every { millis } if *millis <= 0 => {
                Err(SchedulerError::InvalidInterval(*millis))
            }
            _ => Ok(()),
        }
    }

    /// The fixed period this cadence adds.
    pub fn period(&self) -> Duration {
        match self {
            Recurrence::Daily => Duration::hours(24),
            Recurrence::Hourly => Duration::hours(1),
            Recurrence::Every { millis } => Duration::milliseconds(*millis),
        }
    }

    /// Next fire time after `previous`.
    pub fn next_after(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        previous + self.period()
    }
}

/// A one-time message job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    /// Unique id within the scheduler.
    pub id: String,
    /// Recipient identifier.
    pub to: String,
    /// What to deliver.
    pub content: Content,
    /// When to deliver it. A past time fires on the next tick.
    pub send_at: DateTime<Utc>,
    /// Current status.
    pub status: DeliveryStatus,
    /// When this job was registered.
    pub created_at: DateTime<Utc>,
    /// Insertion sequence for stable same-tick ordering; reassigned on import.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl ScheduledMessage {
    pub(crate) fn new(
        id: String,
        to: String,
        content: Content,
        send_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            to,
            content,
            send_at,
            status: DeliveryStatus::Pending,
            created_at,
            seq: 0,
        }
    }
}

/// A recurring message job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringMessage {
    /// Unique id within the scheduler.
    pub id: String,
    /// Recipient identifier.
    pub to: String,
    /// What to deliver on each fire.
    pub content: Content,
    /// Cadence between fires.
    pub interval: Recurrence,
    /// Next fire time; recomputed after every fire.
    pub next_send_at: DateTime<Utc>,
    /// Recurrence stops once the recomputed fire time passes this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    /// Successful deliveries so far; only ever increases.
    #[serde(default)]
    pub send_count: u64,
    /// Current status.
    pub status: RecurringStatus,
    /// When this job was registered.
    pub created_at: DateTime<Utc>,
    /// Insertion sequence for stable same-tick ordering; reassigned on import.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl RecurringMessage {
    pub(crate) fn new(
        id: String,
        to: String,
        content: Content,
        start_at: DateTime<Utc>,
        interval: Recurrence,
        end_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            to,
            content,
            interval,
            next_send_at: start_at,
            end_at,
            send_count: 0,
            status: RecurringStatus::Active,
            created_at,
            seq: 0,
        }
    }
}

/// A non-terminal job, tagged with its kind so callers can branch without
/// downcasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingJob {
    /// A one-time job.
    OneShot(ScheduledMessage),
    /// A recurring job.
    Recurring(RecurringMessage),
}

impl PendingJob {
    /// Job id.
    pub fn id(&self) -> &str {
        match self {
            PendingJob::OneShot(job) => &job.id,
            PendingJob::Recurring(job) => &job.id,
        }
    }

    /// Recipient identifier.
    pub fn to(&self) -> &str {
        match self {
            PendingJob::OneShot(job) => &job.to,
            PendingJob::Recurring(job) => &job.to,
        }
    }

    /// Content delivered when the job fires.
    pub fn content(&self) -> &Content {
        match self {
            PendingJob::OneShot(job) => &job.content,
            PendingJob::Recurring(job) => &job.content,
        }
    }

    /// Next fire time.
    pub fn due_at(&self) -> DateTime<Utc> {
        match self {
            PendingJob::OneShot(job) => job.send_at,
            PendingJob::Recurring(job) => job.next_send_at,
        }
    }

    pub(crate) fn seq(&self) -> u64 {
        match self {
            PendingJob::OneShot(job) => job.seq,
            PendingJob::Recurring(job) => job.seq,
        }
    }
}

/// Input for [`crate::Scheduler::schedule`].
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    /// Caller-supplied id; generated when omitted.
    pub id: Option<String>,
    /// Recipient identifier.
    pub to: String,
    /// What to deliver.
    pub content: Content,
    /// When to deliver it.
    pub send_at: DateTime<Utc>,
}

impl ScheduleRequest {
    /// One-time delivery of `content` to `to` at `send_at`.
    pub fn new(to: impl Into<String>, content: impl Into<Content>, send_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            to: to.into(),
            content: content.into(),
            send_at,
        }
    }

    /// Use a caller-supplied id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Input for [`crate::Scheduler::schedule_recurring`].
#[derive(Debug, Clone)]
pub struct RecurringRequest {
    /// Caller-supplied id; generated when omitted.
    pub id: Option<String>,
    /// Recipient identifier.
    pub to: String,
    /// What to deliver on each fire.
    pub content: Content,
    /// First fire time.
    pub start_at: DateTime<Utc>,
    /// Cadence between fires.
    pub interval: Recurrence,
    /// Optional end of the recurrence.
    pub end_at: Option<DateTime<Utc>>,
}

impl RecurringRequest {
    /// Recurring delivery starting at `start_at` on the given cadence.
    pub fn new(
        to: impl Into<String>,
        content: impl Into<Content>,
        start_at: DateTime<Utc>,
        interval: Recurrence,
    ) -> Self {
        Self {
            id: None,
            to: to.into(),
            content: content.into(),
            start_at,
            interval,
            end_at: None,
        }
    }

    /// Use a caller-supplied id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Stop recurring once the next fire time passes `end_at`.
    pub fn until(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }
}

/// Structural export form: the full set of non-terminal jobs.
///
/// Timestamps serialize as ISO-8601 via chrono. Import replaces the whole
/// in-memory set; it never merges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// One-time jobs, in insertion order.
    pub scheduled: Vec<ScheduledMessage>,
    /// Recurring jobs, in insertion order.
    pub recurring: Vec<RecurringMessage>,
}
