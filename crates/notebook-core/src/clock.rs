//! Time source
//!
//! Audit fields (`added_on`, `edited_on`) are nanosecond unix timestamps;
//! sync bookkeeping (`current_time`, `last_sync_time`, session expiry) uses
//! unix seconds. Everything that needs "now" takes a `Clock` so tests can
//! pin time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds since the unix epoch
    fn now_nanos(&self) -> i64;

    /// Current time in whole seconds since the unix epoch
    fn now_secs(&self) -> i64 {
        self.now_nanos().div_euclid(NANOS_PER_SEC)
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        let now = Utc::now();
        now.timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp().saturating_mul(NANOS_PER_SEC))
    }
}

/// Manually driven clock for tests
#[derive(Debug, Default)]
pub struct FixedClock {
    nanos: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at the given nanosecond timestamp
    pub fn new(nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(nanos),
        }
    }

    /// Create a clock frozen at the given second
    pub fn at_secs(secs: i64) -> Self {
        Self::new(secs * NANOS_PER_SEC)
    }

    /// Move the clock to an absolute nanosecond timestamp
    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Move the clock forward by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        self.nanos.fetch_add(secs * NANOS_PER_SEC, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_nanos(&self) -> i64 {
        (**self).now_nanos()
    }
}
