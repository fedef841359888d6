//! Error types for the scheduler.

use courier_core::SendError;
use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Explicit recurrence interval was zero or negative.
    #[error("invalid interval: {0} ms (must be positive)")]
    InvalidInterval(i64),

    /// A job with this id is already registered.
    #[error("job already exists: {0}")]
    JobExists(String),

    /// Operation attempted on a destroyed scheduler.
    #[error("scheduler has been destroyed")]
    Destroyed,

    /// Persisted job data was malformed; nothing was loaded.
    #[error("import rejected: {0}")]
    Import(String),

    /// Snapshot could not be serialized for export.
    #[error("export failed: {0}")]
    Export(String),

    /// Delivery failed, wrapped with the owning job's id.
    #[error("send failed for job {id}: {source}")]
    SendFailed {
        /// Id of the job whose send failed.
        id: String,
        /// The sender's failure.
        #[source]
        source: SendError,
    },
}
