// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A clock that advances with tokio's virtual time.

use std::sync::atomic::{AtomicI64, Ordering};

use chime_core::{Clock, Timestamp, timestamp_from_nanos};
use chrono::TimeDelta;
use tokio::time::Instant;

/// Reports `base + elapsed tokio time + skew`.
///
/// Skew lets a test make the clock disagree with the timer, as a real wall
/// clock does when it is adjusted.
pub struct MockClock {
    base: Timestamp,
    start: Instant,
    skew_ms: AtomicI64,
}

impl MockClock {
    /// Start at `base`. Must be created inside the tokio runtime under test.
    pub fn new(base: Timestamp) -> Self {
        Self {
            base,
            start: Instant::now(),
            skew_ms: AtomicI64::new(0),
        }
    }

    pub fn at_unix_seconds(seconds: i64) -> Self {
        Self::new(timestamp_from_nanos(seconds * 1_000_000_000))
    }

    /// Shift every later reading by `skew`. Negative values make the clock lag.
    pub fn set_skew(&self, skew: TimeDelta) {
        self.skew_ms.store(skew.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        let elapsed = TimeDelta::from_std(self.start.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
        self.base + elapsed + TimeDelta::milliseconds(self.skew_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_virtual_time() {
        let clock = MockClock::at_unix_seconds(100);
        let before = clock.now();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.now() - before, TimeDelta::seconds(5));
    }

    #[tokio::test(start_paused = true)]
    async fn skew_shifts_readings() {
        let clock = MockClock::at_unix_seconds(100);
        clock.set_skew(TimeDelta::seconds(-3));
        assert_eq!(clock.now(), timestamp_from_nanos(97_000_000_000));
    }
}
