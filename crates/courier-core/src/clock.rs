//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Supplies the current time.
///
/// The scheduler reads time exclusively through this trait so tests can
/// substitute a manual clock and drive ticks deterministically.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
