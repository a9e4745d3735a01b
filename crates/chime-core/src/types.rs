// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the scheduler, the storage layer, and alarm handlers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ChimeError;

/// An instant on the authoritative clock. Persisted as nanoseconds since the Unix epoch.
pub type Timestamp = DateTime<Utc>;

/// Encode a timestamp as signed nanoseconds since the Unix epoch.
///
/// Fails for instants outside the `i64` nanosecond range (roughly 1677..2262).
pub fn timestamp_to_nanos(ts: Timestamp) -> Result<i64, ChimeError> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| ChimeError::InvalidTimestamp(format!("{ts} is out of nanosecond range")))
}

/// Decode a persisted nanosecond value.
pub fn timestamp_from_nanos(nanos: i64) -> Timestamp {
    DateTime::from_timestamp_nanos(nanos)
}

/// Identity of a tenant-scoped actor: the namespace's unique key plus the actor id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorKey {
    pub unique_key: String,
    pub actor_id: String,
}

impl ActorKey {
    pub fn new(unique_key: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            unique_key: unique_key.into(),
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unique_key, self.actor_id)
    }
}

/// How an alarm invocation ended, as reported by the invocation layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Ok,
    Canceled,
    Exception,
    ExceededCpu,
    ExceededMemory,
    KillSwitch,
    DaemonDown,
    ScriptNotFound,
    LoadShed,
    ResponseStreamDisconnected,
    Unknown,
}

/// Result of running an actor's alarm handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmResult {
    pub outcome: EventOutcome,
    /// Whether the handler asks for the alarm to be retried.
    pub retry: bool,
    /// Whether a retry should consume one of the limited retry attempts.
    pub retry_counts_against_limit: bool,
}

impl AlarmResult {
    /// A successful invocation. Never retried.
    pub const fn success() -> Self {
        Self {
            outcome: EventOutcome::Ok,
            retry: false,
            retry_counts_against_limit: false,
        }
    }

    /// An application-level failure that asks for a retry.
    pub const fn failure(outcome: EventOutcome, counts_against_limit: bool) -> Self {
        Self {
            outcome,
            retry: true,
            retry_counts_against_limit: counts_against_limit,
        }
    }

    /// A retry is warranted only for a non-OK outcome that requested one.
    pub fn should_retry(&self) -> bool {
        self.outcome != EventOutcome::Ok && self.retry
    }
}

/// Lifecycle of a scheduled alarm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlarmStatus {
    /// Sleeping until the scheduled time.
    Waiting,
    /// The handler is running.
    Started,
    /// The last invocation settled; a retry may be pending.
    Finished,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn timestamp_nanos_roundtrip() {
        let ts = timestamp_from_nanos(1_700_000_000_123_456_789);
        assert_eq!(timestamp_to_nanos(ts).unwrap(), 1_700_000_000_123_456_789);
    }

    #[test]
    fn timestamp_out_of_range_is_rejected() {
        let far = DateTime::<Utc>::MAX_UTC;
        assert!(matches!(
            timestamp_to_nanos(far),
            Err(ChimeError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn actor_key_display_and_equality() {
        let a = ActorKey::new("ns", "actor-1");
        let b = ActorKey::new(String::from("ns"), String::from("actor-1"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ns/actor-1");
        assert_ne!(a, ActorKey::new("ns", "actor-2"));
    }

    #[test]
    fn success_never_retries() {
        let mut result = AlarmResult::success();
        result.retry = true;
        assert!(!result.should_retry());
    }

    #[test]
    fn failure_retries() {
        let result = AlarmResult::failure(EventOutcome::Exception, true);
        assert!(result.should_retry());
        assert!(result.retry_counts_against_limit);
    }

    #[test]
    fn event_outcome_strings() {
        assert_eq!(EventOutcome::ExceededCpu.to_string(), "exceeded_cpu");
        assert_eq!(
            EventOutcome::from_str("kill_switch").unwrap(),
            EventOutcome::KillSwitch
        );
        let json = serde_json::to_string(&EventOutcome::LoadShed).unwrap();
        assert_eq!(json, "\"load_shed\"");
    }

    #[test]
    fn alarm_status_display() {
        assert_eq!(AlarmStatus::Waiting.to_string(), "waiting");
        assert_eq!(AlarmStatus::Started.to_string(), "started");
        assert_eq!(AlarmStatus::Finished.to_string(), "finished");
    }
}
