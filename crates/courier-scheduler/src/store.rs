//! In-memory job registry.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::types::{
    DeliveryStatus, JobSnapshot, PendingJob, RecurringMessage, RecurringStatus, ScheduledMessage,
};
use crate::SchedulerError;

/// Which vector a due job lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobKind {
    OneShot,
    Recurring,
}

/// Reference to a due job, resolved against the store at fire time.
#[derive(Debug, Clone)]
pub(crate) struct DueRef {
    pub(crate) id: String,
    pub(crate) kind: JobKind,
}

/// Registry of pending and active jobs.
///
/// Jobs are kept in insertion order; firing order is by due time with
/// insertion order breaking ties. Only non-terminal jobs live here - the
/// scheduler prunes terminal entries after each tick and `cancel` removes
/// immediately.
#[derive(Debug, Default)]
pub(crate) struct JobStore {
    scheduled: Vec<ScheduledMessage>,
    recurring: Vec<RecurringMessage>,
    next_seq: u64,
}

impl JobStore {
    pub(crate) fn contains_id(&self, id: &str) -> bool {
        self.scheduled.iter().any(|job| job.id == id)
            || self.recurring.iter().any(|job| job.id == id)
    }

    pub(crate) fn insert_scheduled(&mut self, mut job: ScheduledMessage) {
        job.seq = self.bump_seq();
        self.scheduled.push(job);
    }

    pub(crate) fn insert_recurring(&mut self, mut job: RecurringMessage) {
        job.seq = self.bump_seq();
        self.recurring.push(job);
    }

    /// Drop a live job from the scan set.
    ///
    /// Returns whether a job was found; a second call for the same id
    /// returns false.
    pub(crate) fn cancel(&mut self, id: &str) -> bool {
        if let Some(index) = self.scheduled.iter().position(|job| job.id == id) {
            self.scheduled.remove(index);
            return true;
        }
        if let Some(index) = self.recurring.iter().position(|job| job.id == id) {
            self.recurring.remove(index);
            return true;
        }
        false
    }

    /// Move a live job's next fire time. Returns false when no live job
    /// matches.
    pub(crate) fn reschedule(&mut self, id: &str, new_time: DateTime<Utc>) -> bool {
        if let Some(job) = self.scheduled.iter_mut().find(|job| job.id == id) {
            job.send_at = new_time;
            return true;
        }
        if let Some(job) = self.recurring.iter_mut().find(|job| job.id == id) {
            job.next_send_at = new_time;
            return true;
        }
        false
    }

    /// All jobs due at `now`, ordered by due time ascending, ties by
    /// insertion order.
    pub(crate) fn due(&self, now: DateTime<Utc>) -> Vec<DueRef> {
        let mut due: Vec<(DateTime<Utc>, u64, DueRef)> = Vec::new();
        for job in &self.scheduled {
            if job.status == DeliveryStatus::Pending && job.send_at <= now {
                due.push((
                    job.send_at,
                    job.seq,
                    DueRef {
                        id: job.id.clone(),
                        kind: JobKind::OneShot,
                    },
                ));
            }
        }
        for job in &self.recurring {
            if job.status == RecurringStatus::Active && job.next_send_at <= now {
                due.push((
                    job.next_send_at,
                    job.seq,
                    DueRef {
                        id: job.id.clone(),
                        kind: JobKind::Recurring,
                    },
                ));
            }
        }
        due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, _, job)| job).collect()
    }

    /// Snapshot of every non-terminal job, ordered by next fire time.
    pub(crate) fn pending(&self) -> Vec<PendingJob> {
        let mut jobs: Vec<PendingJob> = self
            .scheduled
            .iter()
            .filter(|job| !job.status.is_terminal())
            .cloned()
            .map(PendingJob::OneShot)
            .chain(
                self.recurring
                    .iter()
                    .filter(|job| !job.status.is_terminal())
                    .cloned()
                    .map(PendingJob::Recurring),
            )
            .collect();
        jobs.sort_by(|a, b| a.due_at().cmp(&b.due_at()).then(a.seq().cmp(&b.seq())));
        jobs
    }

    pub(crate) fn get(&self, id: &str) -> Option<PendingJob> {
        if let Some(job) = self.scheduled.iter().find(|job| job.id == id) {
            return Some(PendingJob::OneShot(job.clone()));
        }
        self.recurring
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .map(PendingJob::Recurring)
    }

    pub(crate) fn get_scheduled(&self, id: &str) -> Option<&ScheduledMessage> {
        self.scheduled.iter().find(|job| job.id == id)
    }

    pub(crate) fn get_scheduled_mut(&mut self, id: &str) -> Option<&mut ScheduledMessage> {
        self.scheduled.iter_mut().find(|job| job.id == id)
    }

    pub(crate) fn get_recurring(&self, id: &str) -> Option<&RecurringMessage> {
        self.recurring.iter().find(|job| job.id == id)
    }

    pub(crate) fn get_recurring_mut(&mut self, id: &str) -> Option<&mut RecurringMessage> {
        self.recurring.iter_mut().find(|job| job.id == id)
    }

    /// Drop jobs that reached a terminal state during the last tick.
    pub(crate) fn prune_terminal(&mut self) {
        self.scheduled.retain(|job| !job.status.is_terminal());
        self.recurring.retain(|job| !job.status.is_terminal());
    }

    /// Serialize the full non-terminal set.
    pub(crate) fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            scheduled: self
                .scheduled
                .iter()
                .filter(|job| !job.status.is_terminal())
                .cloned()
                .collect(),
            recurring: self
                .recurring
                .iter()
                .filter(|job| !job.status.is_terminal())
                .cloned()
                .collect(),
        }
    }

    /// Replace the whole set from a validated snapshot; insertion sequences
    /// are reassigned in snapshot order.
    pub(crate) fn replace(&mut self, snapshot: JobSnapshot) {
        self.scheduled.clear();
        self.recurring.clear();
        self.next_seq = 0;
        for job in snapshot.scheduled {
            self.insert_scheduled(job);
        }
        for job in snapshot.recurring {
            self.insert_recurring(job);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.scheduled.clear();
        self.recurring.clear();
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Reject snapshots that would leave the store inconsistent.
///
/// Import is all-or-nothing: the first malformed entry fails the whole
/// snapshot and nothing is loaded.
pub(crate) fn validate_snapshot(snapshot: &JobSnapshot) -> Result<(), SchedulerError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for job in &snapshot.scheduled {
        if job.id.is_empty() {
            return Err(SchedulerError::Import(
                "scheduled entry with empty id".to_string(),
            ));
        }
        if !seen.insert(job.id.as_str()) {
            return Err(SchedulerError::Import(format!("duplicate job id: {}", job.id)));
        }
        if job.status.is_terminal() {
            return Err(SchedulerError::Import(format!(
                "scheduled job {} has terminal status",
                job.id
            )));
        }
    }

    for job in &snapshot.recurring {
        if job.id.is_empty() {
            return Err(SchedulerError::Import(
                "recurring entry with empty id".to_string(),
            ));
        }
        if !seen.insert(job.id.as_str()) {
            return Err(SchedulerError::Import(format!("duplicate job id: {}", job.id)));
        }
        if job.status.is_terminal() {
            return Err(SchedulerError::Import(format!(
                "recurring job {} has terminal status",
                job.id
            )));
        }
        job.interval
            .validate()
            .map_err(|error| SchedulerError::Import(format!("recurring job {}: {error}", job.id)))?;
    }

    Ok(())
}
