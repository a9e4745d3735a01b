// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory record of one actor's alarm and its retry bookkeeping.

use std::time::Duration;

use chime_core::{AlarmStatus, Timestamp};
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::Span;

use crate::policy::RetryPolicy;

/// Snapshot of an actor's alarm state, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub status: AlarmStatus,
    pub scheduled_time: Timestamp,
    pub queued_alarm: Option<Timestamp>,
    /// All retries so far.
    pub retry: u32,
    /// Retries that count against the limit.
    pub counted_retry: u32,
    /// Exponent for the next retry delay.
    pub backoff: u32,
}

/// The scheduler's per-actor record. Exists only while the actor has an alarm.
pub(crate) struct ScheduledAlarm {
    pub(crate) scheduled_time: Timestamp,
    /// Wake task currently driving this record.
    pub(crate) task: Option<JoinHandle<()>>,
    /// Identifies `task`; a task whose generation no longer matches must not touch the record.
    pub(crate) generation: u64,
    /// Alarm set while the current one is running. Only `Some` while `Started`.
    pub(crate) queued_alarm: Option<Timestamp>,
    pub(crate) status: AlarmStatus,
    pub(crate) backoff: u32,
    pub(crate) retry: u32,
    pub(crate) counted_retry: u32,
    pub(crate) previous_retry_counted_against_limit: bool,
    /// The persisted row was deleted while the handler was running.
    pub(crate) deleted: bool,
    /// Span shared by every wake task spawned for this record.
    pub(crate) span: Span,
}

impl ScheduledAlarm {
    pub(crate) fn new(
        scheduled_time: Timestamp,
        generation: u64,
        task: JoinHandle<()>,
        span: Span,
    ) -> Self {
        Self {
            scheduled_time,
            task: Some(task),
            generation,
            queued_alarm: None,
            status: AlarmStatus::Waiting,
            backoff: 0,
            retry: 0,
            counted_retry: 0,
            previous_retry_counted_against_limit: false,
            deleted: false,
            span,
        }
    }

    /// The alarm `get_alarm` reports. A running alarm is never "next".
    pub(crate) fn next_alarm(&self) -> Option<Timestamp> {
        match self.status {
            AlarmStatus::Started => self.queued_alarm,
            AlarmStatus::Waiting | AlarmStatus::Finished => Some(self.scheduled_time),
        }
    }

    /// Abort the wake task. Must not be called while `Started`.
    pub(crate) fn cancel(&mut self) {
        debug_assert_ne!(self.status, AlarmStatus::Started);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Account for a failed attempt and compute the delay before the next one.
    ///
    /// Returns `None` once the counted retries have reached `policy.max_tries`.
    /// Backoff restarts at zero whenever the failure class flips between
    /// counted (application) and uncounted (infrastructure) failures.
    pub(crate) fn plan_retry<R: Rng + ?Sized>(
        &mut self,
        counts_against_limit: bool,
        policy: &RetryPolicy,
        rng: &mut R,
    ) -> Option<Duration> {
        if self.counted_retry >= policy.max_tries {
            return None;
        }

        if counts_against_limit {
            self.counted_retry += 1;
        }
        if counts_against_limit != self.previous_retry_counted_against_limit {
            self.backoff = 0;
        }
        self.previous_retry_counted_against_limit = counts_against_limit;

        self.backoff = self.backoff.min(policy.backoff_max);
        let delay = policy.retry_delay(self.backoff, rng);
        self.backoff = self.backoff.saturating_add(1);
        self.retry = self.retry.saturating_add(1);
        Some(delay)
    }

    pub(crate) fn retry_state(&self) -> RetryState {
        RetryState {
            status: self.status,
            scheduled_time: self.scheduled_time,
            queued_alarm: self.queued_alarm,
            retry: self.retry,
            counted_retry: self.counted_retry,
            backoff: self.backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::timestamp_from_nanos;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        }
    }

    async fn record() -> ScheduledAlarm {
        ScheduledAlarm::new(
            timestamp_from_nanos(0),
            1,
            tokio::spawn(async {}),
            Span::none(),
        )
    }

    #[tokio::test]
    async fn next_alarm_hides_running_alarm() {
        let mut alarm = record().await;
        assert_eq!(alarm.next_alarm(), Some(timestamp_from_nanos(0)));

        alarm.status = AlarmStatus::Started;
        assert_eq!(alarm.next_alarm(), None);

        alarm.queued_alarm = Some(timestamp_from_nanos(5));
        assert_eq!(alarm.next_alarm(), Some(timestamp_from_nanos(5)));

        alarm.status = AlarmStatus::Finished;
        alarm.queued_alarm = None;
        assert_eq!(alarm.next_alarm(), Some(timestamp_from_nanos(0)));
    }

    #[tokio::test]
    async fn counted_failures_back_off_exponentially() {
        let mut alarm = record().await;
        let mut rng = StdRng::seed_from_u64(1);
        let delays: Vec<u64> = (0..3)
            .map(|_| alarm.plan_retry(true, &policy(), &mut rng).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8]);
        assert_eq!(alarm.counted_retry, 3);
        assert_eq!(alarm.retry, 3);
    }

    #[tokio::test]
    async fn limit_reached_after_max_counted_retries() {
        let mut alarm = record().await;
        let mut rng = StdRng::seed_from_u64(1);
        let policy = policy();
        for _ in 0..policy.max_tries {
            assert!(alarm.plan_retry(true, &policy, &mut rng).is_some());
        }
        assert_eq!(alarm.plan_retry(true, &policy, &mut rng), None);
        assert_eq!(alarm.counted_retry, policy.max_tries);
    }

    #[tokio::test]
    async fn uncounted_failures_never_hit_the_limit() {
        let mut alarm = record().await;
        let mut rng = StdRng::seed_from_u64(1);
        let policy = policy();
        for _ in 0..(policy.max_tries * 3) {
            assert!(alarm.plan_retry(false, &policy, &mut rng).is_some());
        }
        assert_eq!(alarm.counted_retry, 0);
    }

    #[tokio::test]
    async fn failure_class_change_resets_backoff() {
        let mut alarm = record().await;
        let mut rng = StdRng::seed_from_u64(1);
        let policy = policy();

        // Three infrastructure failures: 2s, 4s, 8s.
        for _ in 0..3 {
            alarm.plan_retry(false, &policy, &mut rng);
        }
        assert_eq!(alarm.backoff, 3);

        // First application failure starts over at the base delay.
        let delay = alarm.plan_retry(true, &policy, &mut rng).unwrap();
        assert_eq!(delay, Duration::from_secs(2));

        // And switching back resets again.
        alarm.plan_retry(true, &policy, &mut rng);
        let delay = alarm.plan_retry(false, &policy, &mut rng).unwrap();
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn delay_constant_after_ceiling() {
        let mut alarm = record().await;
        let mut rng = StdRng::seed_from_u64(1);
        let policy = RetryPolicy {
            backoff_max: 2,
            ..policy()
        };
        let delays: Vec<u64> = (0..5)
            .map(|_| alarm.plan_retry(false, &policy, &mut rng).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 8, 8]);
    }
}
