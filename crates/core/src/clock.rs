// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so state transitions are testable without real time.

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of timestamps for status-document mutations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }

    /// ISO-8601 rendering used for `lastUpdated` and task timestamps.
    fn iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: std::sync::Arc<parking_lot::Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(parking_lot::Mutex::new(now)),
        }
    }

    pub fn epoch() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn advance(&self, d: chrono::Duration) {
        let mut now = self.now.lock();
        *now += d;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
