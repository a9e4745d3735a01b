// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delay primitive used by wake tasks.

use std::time::Duration;

use async_trait::async_trait;

/// Resolves after (approximately) the given delay.
///
/// Timers are not assumed to agree with [`Clock`](super::Clock): a timer may
/// fire a little early relative to the clock, and callers re-check.
#[async_trait]
pub trait Timer: Send + Sync {
    async fn after_delay(&self, delay: Duration);
}

/// Timer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn after_delay(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
