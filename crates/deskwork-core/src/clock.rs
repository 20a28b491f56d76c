//! Wall-clock source injected into the engine.
//!
//! All persisted timestamps are microseconds since the Unix epoch.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" for derived timestamps (`updated_at`, closing time,
/// audit comment time).
pub trait Clock: Send + Sync {
    fn now_us(&self) -> i64;
}

/// Real UTC wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> i64 {
        chrono::Utc::now().timestamp_micros()
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock {
    now_us: AtomicI64,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now_us: i64) -> Self {
        Self {
            now_us: AtomicI64::new(now_us),
        }
    }

    pub fn set(&self, now_us: i64) {
        self.now_us.store(now_us, Ordering::SeqCst);
    }

    /// Move the clock forward and return the new reading.
    pub fn advance(&self, delta_us: i64) -> i64 {
        self.now_us.fetch_add(delta_us, Ordering::SeqCst) + delta_us
    }
}

impl Clock for FixedClock {
    fn now_us(&self) -> i64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

/// Render a microsecond timestamp as RFC 3339 (UTC), or the raw number if
/// it is out of chrono's range.
#[must_use]
pub fn format_us(ts_us: i64) -> String {
    chrono::DateTime::from_timestamp_micros(ts_us)
        .map_or_else(|| ts_us.to_string(), |dt| dt.to_rfc3339())
}
