// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alarm entry point of an actor.

use async_trait::async_trait;

use crate::error::ChimeError;
use crate::types::{AlarmResult, Timestamp};

/// An invocable actor handle, produced by a namespace resolver.
///
/// `Ok(result)` carries the handler's own verdict, including application
/// failures. `Err(_)` means the invocation path itself broke; the scheduler
/// retries those without counting them against the retry limit.
#[async_trait]
pub trait AlarmHandler: Send + Sync {
    /// Run the actor's alarm for `scheduled_time`.
    ///
    /// `retry_count` is the number of counted retries already spent on this alarm.
    async fn run_alarm(
        &self,
        scheduled_time: Timestamp,
        retry_count: u32,
    ) -> Result<AlarmResult, ChimeError>;
}
