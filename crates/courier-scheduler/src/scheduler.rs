//! Scheduler implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_core::{Clock, Content, MessageSender, SendError, SendReceipt, SystemClock};
use courier_plugin::{DeliveryEvent, ErrorEvent, ErrorOrigin, HookEvent, PluginRegistry, SendEvent};

use crate::events::{NoopEvents, SchedulerEvents};
use crate::store::{validate_snapshot, JobKind, JobStore};
use crate::types::{
    DeliveryStatus, JobSnapshot, PendingJob, RecurringMessage, RecurringStatus, RecurringRequest,
    ScheduleRequest, ScheduledMessage,
};
use crate::SchedulerError;

/// Default cadence of the due-job scan.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

struct SchedulerInner {
    store: RwLock<JobStore>,
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn SchedulerEvents>,
    hooks: Option<PluginRegistry>,
    check_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    running: AtomicBool,
    destroyed: AtomicBool,
}

/// Builder for a [`Scheduler`].
pub struct SchedulerBuilder {
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn SchedulerEvents>,
    hooks: Option<PluginRegistry>,
    check_interval: Duration,
}

impl SchedulerBuilder {
    fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopEvents),
            hooks: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Replace the wall clock, usually with a manual clock in tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install event callbacks for the owning application.
    pub fn events(mut self, events: Arc<dyn SchedulerEvents>) -> Self {
        self.events = events;
        self
    }

    /// Route every send through this plugin registry (`BeforeSend`,
    /// `AfterSend`, `Error` hooks).
    pub fn hooks(mut self, registry: PluginRegistry) -> Self {
        self.hooks = Some(registry);
        self
    }

    /// Cadence of the due-job scan. Defaults to one second.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Build the scheduler. The timer loop does not run until
    /// [`Scheduler::start`] is called.
    pub fn build(self) -> Scheduler {
        let (shutdown_tx, _) = watch::channel(false);
        Scheduler {
            inner: Arc::new(SchedulerInner {
                store: RwLock::new(JobStore::default()),
                sender: self.sender,
                clock: self.clock,
                events: self.events,
                hooks: self.hooks,
                check_interval: self.check_interval,
                shutdown_tx,
                running: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        }
    }
}

/// The message scheduler.
///
/// Cheaply clonable handle; clones share the same job set and timer loop.
///
/// Post-destroy behavior, chosen once and kept consistent: `schedule`,
/// `schedule_recurring`, and `import` fail with
/// [`SchedulerError::Destroyed`]; `cancel` and `reschedule` return `false`;
/// queries return empty; `tick` and `start` are no-ops. No callbacks or
/// hooks fire after [`destroy`](Self::destroy) returns.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Scheduler with the default clock, no event callbacks, no hooks, and a
    /// one second check interval.
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self::builder(sender).build()
    }

    /// Start configuring a scheduler.
    pub fn builder(sender: Arc<dyn MessageSender>) -> SchedulerBuilder {
        SchedulerBuilder::new(sender)
    }

    /// Register a one-time job.
    ///
    /// A `send_at` in the past is not an error: the job fires on the very
    /// next tick (catch-up semantics). Returns the job id, generated when
    /// the request carries none.
    #[tracing::instrument(skip(self, request), fields(to = %request.to))]
    pub async fn schedule(&self, request: ScheduleRequest) -> Result<String, SchedulerError> {
        self.ensure_live()?;
        let id = request.id.unwrap_or_else(generate_id);
        let now = self.inner.clock.now();

        let mut store = self.inner.store.write().await;
        if store.contains_id(&id) {
            return Err(SchedulerError::JobExists(id));
        }
        debug!(id = %id, send_at = %request.send_at, "scheduled one-time message");
        store.insert_scheduled(ScheduledMessage::new(
            id.clone(),
            request.to,
            request.content,
            request.send_at,
            now,
        ));
        Ok(id)
    }

    /// Register a recurring job; the first fire is at `start_at`.
    ///
    /// Rejects non-positive explicit intervals with
    /// [`SchedulerError::InvalidInterval`].
    #[tracing::instrument(skip(self, request), fields(to = %request.to))]
    pub async fn schedule_recurring(
        &self,
        request: RecurringRequest,
    ) -> Result<String, SchedulerError> {
        self.ensure_live()?;
        request.interval.validate()?;
        let id = request.id.unwrap_or_else(generate_id);
        let now = self.inner.clock.now();

        let mut store = self.inner.store.write().await;
        if store.contains_id(&id) {
            return Err(SchedulerError::JobExists(id));
        }
        debug!(id = %id, start_at = %request.start_at, "scheduled recurring message");
        store.insert_recurring(RecurringMessage::new(
            id.clone(),
            request.to,
            request.content,
            request.start_at,
            request.interval,
            request.end_at,
            now,
        ));
        Ok(id)
    }

    /// Cancel a pending or active job.
    ///
    /// Returns whether a job was found; idempotent, so a second call for the
    /// same id returns false. Takes effect before the next tick's scan and
    /// never interrupts an in-flight send.
    pub async fn cancel(&self, id: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let cancelled = self.inner.store.write().await.cancel(id);
        if cancelled {
            info!(id, "cancelled job");
        }
        cancelled
    }

    /// Move a live job's fire time (`send_at` for one-time jobs,
    /// `next_send_at` for recurring). Returns false when the job is missing
    /// or already terminal.
    pub async fn reschedule(&self, id: &str, new_time: DateTime<Utc>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let moved = self.inner.store.write().await.reschedule(id, new_time);
        if moved {
            debug!(id, new_time = %new_time, "rescheduled job");
        }
        moved
    }

    /// Snapshot of all non-terminal jobs, ordered by next fire time
    /// ascending and tagged with their kind. Restartable: the returned
    /// vector can be iterated any number of times.
    pub async fn pending_jobs(&self) -> Vec<PendingJob> {
        self.inner.store.read().await.pending()
    }

    /// Look up a single live job by id.
    pub async fn get_job(&self, id: &str) -> Option<PendingJob> {
        self.inner.store.read().await.get(id)
    }

    /// Serialize the full set of non-terminal jobs for persistence.
    pub async fn export(&self) -> JobSnapshot {
        self.inner.store.read().await.snapshot()
    }

    /// [`export`](Self::export) as a JSON string.
    pub async fn export_json(&self) -> Result<String, SchedulerError> {
        serde_json::to_string(&self.export().await)
            .map_err(|error| SchedulerError::Export(error.to_string()))
    }

    /// Replace the entire in-memory job set from a snapshot.
    ///
    /// All-or-nothing: any malformed entry rejects the whole snapshot with
    /// [`SchedulerError::Import`] and the current set is untouched. Import
    /// never merges.
    pub async fn import(&self, snapshot: JobSnapshot) -> Result<(), SchedulerError> {
        self.ensure_live()?;
        validate_snapshot(&snapshot)?;
        let count = snapshot.scheduled.len() + snapshot.recurring.len();
        self.inner.store.write().await.replace(snapshot);
        info!(count, "imported job snapshot");
        Ok(())
    }

    /// [`import`](Self::import) from a JSON string.
    pub async fn import_json(&self, data: &str) -> Result<(), SchedulerError> {
        let snapshot: JobSnapshot = serde_json::from_str(data)
            .map_err(|error| SchedulerError::Import(format!("malformed snapshot: {error}")))?;
        self.import(snapshot).await
    }

    /// Spawn the timer loop. No-op when already running or destroyed.
    pub fn start(&self) {
        if self.is_destroyed() || self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = self.clone();
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });
        info!(interval_ms = self.inner.check_interval.as_millis() as u64, "scheduler started");
    }

    /// Whether the timer loop is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop the timer loop and clear all jobs.
    ///
    /// Idempotent. After this returns, no further callbacks or hooks fire
    /// from this scheduler.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.shutdown_tx.send(true);
        self.inner.store.write().await.clear();
        info!("scheduler destroyed");
    }

    /// One due-job scan-and-fire pass.
    ///
    /// The timer loop calls this on every check interval; tests with an
    /// injected clock may drive it manually instead of running the loop.
    /// Reads the clock once, so every due comparison in the pass uses the
    /// same timestamp. Due jobs fire sequentially in ascending due-time
    /// order, ties broken by insertion order.
    pub async fn tick(&self) {
        if self.is_destroyed() {
            return;
        }
        let now = self.inner.clock.now();
        let due = self.inner.store.read().await.due(now);
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "processing due jobs");

        for entry in due {
            if self.is_destroyed() {
                return;
            }
            match entry.kind {
                JobKind::OneShot => self.fire_scheduled(&entry.id).await,
                JobKind::Recurring => self.fire_recurring(&entry.id).await,
            }
        }

        self.inner.store.write().await.prune_terminal();
    }

    /// The timer loop. Tick work is awaited inline, so ticks never
    /// interleave; a tick that overruns the interval causes the overlapped
    /// tick to be skipped.
    async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.inner.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    self.tick().await;
                }
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        info!("scheduler loop stopped");
    }

    /// Fire one due one-time job: deliver, record the terminal status, and
    /// notify callbacks. Skips silently when the job was cancelled between
    /// scan and fire.
    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn fire_scheduled(&self, id: &str) {
        let job = {
            let store = self.inner.store.read().await;
            match store.get_scheduled(id) {
                Some(job) if job.status == DeliveryStatus::Pending => job.clone(),
                _ => return,
            }
        };

        let result = self.deliver(id, &job.to, &job.content).await;
        if self.is_destroyed() {
            return;
        }

        let updated = {
            let mut store = self.inner.store.write().await;
            store.get_scheduled_mut(id).and_then(|job| {
                if job.status != DeliveryStatus::Pending {
                    return None;
                }
                job.status = match result {
                    Ok(_) => DeliveryStatus::Sent,
                    Err(_) => DeliveryStatus::Failed,
                };
                Some(job.clone())
            })
        };
        let Some(updated) = updated else { return };

        let job = PendingJob::OneShot(updated);
        match result {
            Ok(receipt) => {
                info!(id, "sent scheduled message");
                self.inner.events.on_sent(&job, &receipt).await;
            }
            Err(error) => {
                warn!(id, error = %error, "scheduled send failed");
                let error = SchedulerError::SendFailed {
                    id: id.to_string(),
                    source: error,
                };
                self.inner.events.on_error(&job, &error).await;
            }
        }
    }

    /// Fire one due recurring job. The next occurrence is recomputed from
    /// the previous `next_send_at` whether or not the send succeeded, so a
    /// failed fire does not block the cadence (at the cost of a possible
    /// missed catch-up after a sender outage). `send_count` moves only on
    /// success.
    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn fire_recurring(&self, id: &str) {
        let job = {
            let store = self.inner.store.read().await;
            match store.get_recurring(id) {
                Some(job) if job.status == RecurringStatus::Active => job.clone(),
                _ => return,
            }
        };

        let result = self.deliver(id, &job.to, &job.content).await;
        if self.is_destroyed() {
            return;
        }

        let (updated, completed) = {
            let mut store = self.inner.store.write().await;
            match store.get_recurring_mut(id) {
                Some(job) if job.status == RecurringStatus::Active => {
                    if result.is_ok() {
                        job.send_count += 1;
                    }
                    let next = job.interval.next_after(job.next_send_at);
                    let completed = match job.end_at {
                        Some(end) if next > end => {
                            job.status = RecurringStatus::Completed;
                            Some(job.clone())
                        }
                        _ => {
                            job.next_send_at = next;
                            None
                        }
                    };
                    (Some(job.clone()), completed)
                }
                _ => (None, None),
            }
        };
        let Some(updated) = updated else { return };

        let job = PendingJob::Recurring(updated.clone());
        match result {
            Ok(receipt) => {
                debug!(id, send_count = updated.send_count, "sent recurring message");
                self.inner.events.on_sent(&job, &receipt).await;
            }
            Err(error) => {
                warn!(id, error = %error, "recurring send failed, keeping cadence");
                let error = SchedulerError::SendFailed {
                    id: id.to_string(),
                    source: error,
                };
                self.inner.events.on_error(&job, &error).await;
            }
        }

        if let Some(completed) = completed {
            info!(id, send_count = completed.send_count, "recurring schedule completed");
            self.inner.events.on_complete(&completed).await;
        }
    }

    /// Deliver one message, fanning the surrounding hooks out to plugins
    /// when a registry is attached. Hook failures are collected and echoed
    /// by the registry itself; they never affect delivery.
    async fn deliver(
        &self,
        id: &str,
        to: &str,
        content: &Content,
    ) -> Result<SendReceipt, SendError> {
        if let Some(hooks) = &self.inner.hooks {
            let failures = hooks
                .dispatch(HookEvent::BeforeSend(SendEvent {
                    to: to.to_string(),
                    content: content.clone(),
                }))
                .await;
            if !failures.is_empty() {
                debug!(id, count = failures.len(), "before-send hook failures");
            }
        }

        let result = self.inner.sender.send(to, content).await;

        if let Some(hooks) = &self.inner.hooks {
            match &result {
                Ok(receipt) => {
                    hooks
                        .dispatch(HookEvent::AfterSend(DeliveryEvent {
                            to: to.to_string(),
                            content: content.clone(),
                            receipt: *receipt,
                        }))
                        .await;
                }
                Err(error) => {
                    hooks
                        .dispatch(HookEvent::Error(ErrorEvent {
                            message: error.to_string(),
                            origin: ErrorOrigin::Send {
                                job_id: id.to_string(),
                                to: to.to_string(),
                            },
                        }))
                        .await;
                }
            }
        }

        result
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), SchedulerError> {
        if self.is_destroyed() {
            return Err(SchedulerError::Destroyed);
        }
        Ok(())
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use courier_plugin::{HookError, Plugin};
    use pretty_assertions::assert_eq;

    use crate::types::Recurrence;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn at(start: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(start),
            })
        }

        fn advance(&self, by: ChronoDuration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct MockSender {
        calls: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl MockSender {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSender for MockSender {
        async fn send(&self, to: &str, _content: &Content) -> Result<SendReceipt, SendError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SendError::new("host offline"));
            }
            self.calls.lock().unwrap().push(to.to_string());
            Ok(SendReceipt { sent_at: Utc::now() })
        }
    }

    #[derive(Default)]
    struct RecordingEvents {
        sent: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        completed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SchedulerEvents for RecordingEvents {
        async fn on_sent(&self, job: &PendingJob, _receipt: &SendReceipt) {
            self.sent.lock().unwrap().push(job.id().to_string());
        }

        async fn on_error(&self, job: &PendingJob, _error: &SchedulerError) {
            self.errors.lock().unwrap().push(job.id().to_string());
        }

        async fn on_complete(&self, job: &RecurringMessage) {
            self.completed.lock().unwrap().push(job.id.clone());
        }
    }

    fn harness(
        start: DateTime<Utc>,
    ) -> (Scheduler, Arc<MockSender>, Arc<ManualClock>, Arc<RecordingEvents>) {
        let sender = MockSender::new();
        let clock = ManualClock::at(start);
        let events = Arc::new(RecordingEvents::default());
        let scheduler = Scheduler::builder(sender.clone())
            .clock(clock.clone())
            .events(events.clone())
            .build();
        (scheduler, sender, clock, events)
    }

    #[tokio::test]
    async fn test_past_due_job_fires_on_first_tick() {
        let now = Utc::now();
        let (scheduler, sender, _clock, events) = harness(now);

        let id = scheduler
            .schedule(
                ScheduleRequest::new("alice", "hi", now - ChronoDuration::seconds(1)).with_id("j1"),
            )
            .await
            .unwrap();
        assert_eq!(id, "j1");

        scheduler.tick().await;

        assert_eq!(sender.calls(), vec!["alice"]);
        assert_eq!(*events.sent.lock().unwrap(), vec!["j1"]);
        assert!(scheduler.pending_jobs().await.is_empty());

        // Terminal: a second tick must not attempt another send.
        scheduler.tick().await;
        assert_eq!(sender.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_future_job_waits_for_its_time() {
        let now = Utc::now();
        let (scheduler, sender, clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("alice", "later", now + ChronoDuration::minutes(5)))
            .await
            .unwrap();

        scheduler.tick().await;
        assert!(sender.calls().is_empty());

        clock.advance(ChronoDuration::minutes(6));
        scheduler.tick().await;
        assert_eq!(sender.calls(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_failed_send_is_terminal_with_one_attempt() {
        let now = Utc::now();
        let (scheduler, sender, _clock, events) = harness(now);
        sender.set_fail(true);

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now).with_id("doomed"))
            .await
            .unwrap();

        scheduler.tick().await;
        scheduler.tick().await;

        assert!(sender.calls().is_empty());
        assert_eq!(*events.errors.lock().unwrap(), vec!["doomed"]);
        assert!(events.sent.lock().unwrap().is_empty());
        assert!(scheduler.pending_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_prevents_overdue_send() {
        let now = Utc::now();
        let (scheduler, sender, _clock, _events) = harness(now);

        let id = scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now - ChronoDuration::hours(1)))
            .await
            .unwrap();

        assert!(scheduler.cancel(&id).await);
        assert!(scheduler.pending_jobs().await.is_empty());
        assert!(!scheduler.cancel(&id).await);

        scheduler.tick().await;
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_moves_fire_time() {
        let now = Utc::now();
        let (scheduler, sender, clock, _events) = harness(now);

        let id = scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now + ChronoDuration::hours(1)))
            .await
            .unwrap();

        assert!(scheduler.reschedule(&id, now + ChronoDuration::seconds(30)).await);
        assert!(!scheduler.reschedule("missing", now).await);

        clock.advance(ChronoDuration::minutes(1));
        scheduler.tick().await;
        assert_eq!(sender.calls(), vec!["alice"]);

        // Terminal after firing: reschedule finds nothing.
        assert!(!scheduler.reschedule(&id, now).await);
    }

    #[tokio::test]
    async fn test_recurring_fire_count_and_completion() {
        let now = Utc::now();
        let (scheduler, sender, clock, events) = harness(now);

        let interval = Recurrence::every(15 * 60 * 1000).unwrap();
        let id = scheduler
            .schedule_recurring(
                RecurringRequest::new("team", "standup", now, interval)
                    .with_id("r1")
                    .until(now + ChronoDuration::minutes(45)),
            )
            .await
            .unwrap();

        // floor(45 / 15) + 1 = 4 fires, boundary inclusive at start.
        for _ in 0..4 {
            scheduler.tick().await;
            clock.advance(ChronoDuration::minutes(15));
        }
        scheduler.tick().await; // nothing left

        assert_eq!(sender.calls().len(), 4);
        assert_eq!(*events.completed.lock().unwrap(), vec!["r1"]);
        assert_eq!(events.sent.lock().unwrap().len(), 4);
        assert!(scheduler.pending_jobs().await.is_empty());
        assert!(scheduler.get_job(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_recurring_failure_keeps_cadence() {
        let now = Utc::now();
        let (scheduler, sender, clock, events) = harness(now);

        scheduler
            .schedule_recurring(
                RecurringRequest::new("team", "ping", now, Recurrence::Hourly).with_id("r1"),
            )
            .await
            .unwrap();

        sender.set_fail(true);
        scheduler.tick().await;

        let job = scheduler.get_job("r1").await.unwrap();
        let PendingJob::Recurring(job) = job else {
            panic!("expected recurring job");
        };
        assert_eq!(job.send_count, 0);
        assert_eq!(job.next_send_at, now + ChronoDuration::hours(1));
        assert_eq!(*events.errors.lock().unwrap(), vec!["r1"]);

        // Next occurrence still fires once the sender recovers.
        sender.set_fail(false);
        clock.advance(ChronoDuration::hours(1));
        scheduler.tick().await;

        let PendingJob::Recurring(job) = scheduler.get_job("r1").await.unwrap() else {
            panic!("expected recurring job");
        };
        assert_eq!(job.send_count, 1);
        assert_eq!(sender.calls(), vec!["team"]);
    }

    #[tokio::test]
    async fn test_overdue_recurring_catches_up_one_fire_per_tick() {
        let now = Utc::now();
        let (scheduler, sender, _clock, _events) = harness(now);

        // Started two intervals ago; each tick catches up one occurrence.
        scheduler
            .schedule_recurring(RecurringRequest::new(
                "team",
                "ping",
                now - ChronoDuration::minutes(30),
                Recurrence::every(15 * 60 * 1000).unwrap(),
            ))
            .await
            .unwrap();

        scheduler.tick().await;
        assert_eq!(sender.calls().len(), 1);
        scheduler.tick().await;
        assert_eq!(sender.calls().len(), 2);
        scheduler.tick().await;
        assert_eq!(sender.calls().len(), 3);
        // Caught up: next_send_at is now in the future.
        scheduler.tick().await;
        assert_eq!(sender.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_same_tick_ordering_by_due_time_then_insertion() {
        let now = Utc::now();
        let (scheduler, sender, _clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("third", "c", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        scheduler
            .schedule(ScheduleRequest::new("first", "a", now - ChronoDuration::seconds(10)))
            .await
            .unwrap();
        // Same due time as "third" but inserted later.
        scheduler
            .schedule(ScheduleRequest::new("fourth", "d", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();
        scheduler
            .schedule(ScheduleRequest::new("second", "b", now - ChronoDuration::seconds(5)))
            .await
            .unwrap();

        scheduler.tick().await;
        assert_eq!(sender.calls(), vec!["first", "second", "third", "fourth"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let now = Utc::now();
        let (scheduler, _sender, _clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now).with_id("dup"))
            .await
            .unwrap();
        let error = scheduler
            .schedule_recurring(
                RecurringRequest::new("bob", "yo", now, Recurrence::Daily).with_id("dup"),
            )
            .await
            .unwrap_err();
        assert_eq!(error, SchedulerError::JobExists("dup".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected() {
        let now = Utc::now();
        let (scheduler, _sender, _clock, _events) = harness(now);

        let error = scheduler
            .schedule_recurring(RecurringRequest::new(
                "bob",
                "yo",
                now,
                Recurrence::Every { millis: -100 },
            ))
            .await
            .unwrap_err();
        assert_eq!(error, SchedulerError::InvalidInterval(-100));
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let now = Utc::now();
        let (scheduler, _sender, _clock, _events) = harness(now);

        scheduler
            .schedule(
                ScheduleRequest::new("alice", "hi", now + ChronoDuration::minutes(5)).with_id("one"),
            )
            .await
            .unwrap();
        scheduler
            .schedule_recurring(
                RecurringRequest::new("team", "standup", now + ChronoDuration::hours(1), Recurrence::Daily)
                    .with_id("two")
                    .until(now + ChronoDuration::days(7)),
            )
            .await
            .unwrap();

        let json = scheduler.export_json().await.unwrap();

        let (restored, _sender, _clock, _events) = harness(now);
        // Import replaces, never merges.
        restored
            .schedule(ScheduleRequest::new("stale", "old", now).with_id("stale"))
            .await
            .unwrap();
        restored.import_json(&json).await.unwrap();

        let pending = restored.pending_jobs().await;
        assert_eq!(pending.len(), 2);
        assert!(restored.get_job("stale").await.is_none());

        let PendingJob::OneShot(one) = restored.get_job("one").await.unwrap() else {
            panic!("expected one-shot job");
        };
        assert_eq!(one.to, "alice");
        assert_eq!(one.send_at, now + ChronoDuration::minutes(5));
        assert_eq!(one.status, DeliveryStatus::Pending);

        let PendingJob::Recurring(two) = restored.get_job("two").await.unwrap() else {
            panic!("expected recurring job");
        };
        assert_eq!(two.interval, Recurrence::Daily);
        assert_eq!(two.next_send_at, now + ChronoDuration::hours(1));
        assert_eq!(two.end_at, Some(now + ChronoDuration::days(7)));
        assert_eq!(two.send_count, 0);
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_data() {
        let now = Utc::now();
        let (scheduler, _sender, _clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now).with_id("keep"))
            .await
            .unwrap();

        let error = scheduler.import_json("{not json").await.unwrap_err();
        assert!(matches!(error, SchedulerError::Import(_)));

        // All-or-nothing: the bad import left the existing set untouched.
        assert!(scheduler.get_job("keep").await.is_some());
    }

    #[tokio::test]
    async fn test_destroyed_scheduler_refuses_operations() {
        let now = Utc::now();
        let (scheduler, sender, _clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now).with_id("gone"))
            .await
            .unwrap();

        scheduler.destroy().await;
        scheduler.destroy().await; // idempotent

        assert_eq!(
            scheduler.schedule(ScheduleRequest::new("b", "x", now)).await,
            Err(SchedulerError::Destroyed)
        );
        assert_eq!(
            scheduler
                .schedule_recurring(RecurringRequest::new("b", "x", now, Recurrence::Daily))
                .await,
            Err(SchedulerError::Destroyed)
        );
        assert_eq!(
            scheduler.import(JobSnapshot::default()).await,
            Err(SchedulerError::Destroyed)
        );
        assert!(!scheduler.cancel("gone").await);
        assert!(!scheduler.reschedule("gone", now).await);
        assert!(scheduler.pending_jobs().await.is_empty());

        scheduler.tick().await;
        assert!(sender.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_hooks_fire_around_delivery() {
        let now = Utc::now();
        let sender = MockSender::new();
        let clock = ManualClock::at(now);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let registry = PluginRegistry::new();
        let before = Arc::clone(&seen);
        let after = Arc::clone(&seen);
        registry.register(
            Plugin::new("tracer")
                .on_before_send(move |event| {
                    let before = Arc::clone(&before);
                    async move {
                        before.lock().unwrap().push(format!("before:{}", event.to));
                        Ok(())
                    }
                })
                .on_after_send(move |event| {
                    let after = Arc::clone(&after);
                    async move {
                        after.lock().unwrap().push(format!("after:{}", event.to));
                        Ok(())
                    }
                }),
        );
        registry.init().await;

        let scheduler = Scheduler::builder(sender.clone())
            .clock(clock.clone())
            .hooks(registry)
            .build();

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now))
            .await
            .unwrap();
        scheduler.tick().await;

        assert_eq!(*seen.lock().unwrap(), vec!["before:alice", "after:alice"]);
        assert_eq!(sender.calls(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_send_failure_reaches_error_hook() {
        let now = Utc::now();
        let sender = MockSender::new();
        sender.set_fail(true);
        let clock = ManualClock::at(now);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let registry = PluginRegistry::new();
        let sink = Arc::clone(&seen);
        registry.register(Plugin::new("watcher").on_error(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(event);
                Ok(())
            }
        }));
        registry.init().await;

        let scheduler = Scheduler::builder(sender.clone())
            .clock(clock.clone())
            .hooks(registry)
            .build();

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now).with_id("j1"))
            .await
            .unwrap();
        scheduler.tick().await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "host offline");
        assert_eq!(
            events[0].origin,
            ErrorOrigin::Send {
                job_id: "j1".to_string(),
                to: "alice".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_hook_failure_does_not_block_delivery() {
        let now = Utc::now();
        let sender = MockSender::new();
        let clock = ManualClock::at(now);

        let registry = PluginRegistry::new();
        registry.register(Plugin::new("grumpy").on_before_send(|_| async {
            Err(HookError::new("inspection failed"))
        }));
        registry.init().await;

        let scheduler = Scheduler::builder(sender.clone())
            .clock(clock.clone())
            .hooks(registry)
            .build();

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now))
            .await
            .unwrap();
        scheduler.tick().await;

        assert_eq!(sender.calls(), vec!["alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_loop_fires_and_destroy_silences_it() {
        let now = Utc::now();
        let (scheduler, sender, _clock, _events) = harness(now);

        scheduler
            .schedule(ScheduleRequest::new("alice", "hi", now - ChronoDuration::seconds(1)))
            .await
            .unwrap();

        scheduler.start();
        scheduler.start(); // no-op while running

        // Paused time auto-advances; one check interval is enough.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(sender.calls(), vec!["alice"]);

        scheduler.destroy().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!scheduler.is_running());

        // Nothing fires after destroy.
        let _ = scheduler
            .schedule(ScheduleRequest::new("bob", "yo", now))
            .await;
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(sender.calls().len(), 1);
    }
}
