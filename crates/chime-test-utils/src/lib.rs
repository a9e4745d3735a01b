// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chime scheduler tests.
//!
//! Everything here is driven by tokio's virtual clock, so tests run with
//! `#[tokio::test(start_paused = true)]` and advance time with
//! `tokio::time::sleep` instead of waiting for real.
//!
//! # Components
//!
//! - [`MockClock`] - Wall clock that follows tokio's paused time, with adjustable skew
//! - [`ScriptedNamespace`] - Alarm handlers that replay scripted outcomes and record every call

pub mod mock_clock;
pub mod scripted;

pub use mock_clock::MockClock;
pub use scripted::{Invocation, ScriptedNamespace, Step};
