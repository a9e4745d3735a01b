// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable per-actor alarm scheduling.
//!
//! [`AlarmScheduler`] keeps at most one alarm per actor, persists every
//! schedule to SQLite before arming its wake task, reloads all alarms on
//! startup, and retries failed deliveries with exponential backoff and jitter.
//! Application failures count against a retry limit; infrastructure failures
//! do not.

pub mod alarm;
pub mod policy;
pub mod registry;
pub mod scheduler;

pub use alarm::RetryState;
pub use policy::RetryPolicy;
pub use registry::{ActorResolver, NamespaceRegistry};
pub use scheduler::{AlarmScheduler, AlarmSchedulerBuilder};
