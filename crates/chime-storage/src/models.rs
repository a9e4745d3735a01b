// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the alarm table.

use chime_core::{ActorKey, Timestamp};

/// One persisted alarm: the pending wake-up time for one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAlarm {
    pub actor: ActorKey,
    pub scheduled_time: Timestamp,
}
