// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry delay computation: exponential backoff with a ceiling plus jitter.

use std::time::Duration;

use chime_config::model::SchedulerConfig;
use rand::Rng;

/// How failed alarm deliveries are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry, in seconds.
    pub start_seconds: u64,
    /// Counted retries allowed before the alarm is dropped.
    pub max_tries: u32,
    /// Ceiling on the backoff exponent.
    pub backoff_max: u32,
    /// Jitter upper bound as a fraction of the un-jittered delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for RetryPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            start_seconds: config.retry_start_seconds,
            max_tries: config.retry_max_tries,
            backoff_max: config.retry_backoff_max,
            jitter_factor: config.retry_jitter_factor,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay for a backoff exponent, clamped at `backoff_max`.
    pub fn base_delay(&self, backoff: u32) -> Duration {
        let exponent = backoff.min(self.backoff_max).min(63);
        Duration::from_secs(self.start_seconds.saturating_mul(1u64 << exponent))
    }

    /// Upper bound of the jitter added to `delay`, in whole milliseconds.
    pub fn max_jitter_ms(&self, delay: Duration) -> u64 {
        (self.jitter_factor * delay.as_millis() as f64).floor() as u64
    }

    /// Full retry delay: base delay plus uniform jitter in `[0, max_jitter_ms]`.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn retry_delay<R: Rng + ?Sized>(&self, backoff: u32, rng: &mut R) -> Duration {
        let delay = self.base_delay(backoff);
        let jitter = rng.gen_range(0..=self.max_jitter_ms(delay));
        delay.saturating_add(Duration::from_millis(jitter))
    }
}
