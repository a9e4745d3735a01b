// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the scheduler and the runtime hosting it.
//!
//! The clock and timer are separate so that a coarse or skewed timer can be
//! reconciled against the authoritative clock. Handlers use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod clock;
pub mod handler;
pub mod timer;

pub use clock::{Clock, SystemClock};
pub use handler::AlarmHandler;
pub use timer::{Timer, TokioTimer};
