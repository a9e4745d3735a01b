// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chime alarm scheduler.
//!
//! This crate provides the error type, the actor/alarm domain types, and the
//! trait seams (clock, timer, alarm handler) that the scheduler consumes.
//! Everything the scheduler needs from the surrounding runtime is expressed
//! through the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChimeError;
pub use types::{
    ActorKey, AlarmResult, AlarmStatus, EventOutcome, Timestamp, timestamp_from_nanos,
    timestamp_to_nanos,
};

pub use traits::{AlarmHandler, Clock, SystemClock, Timer, TokioTimer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_error_has_all_variants() {
        let _config = ChimeError::Config("test".into());
        let _storage = ChimeError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _namespace = ChimeError::NamespaceNotRegistered {
            unique_key: "ns".into(),
        };
        let _invocation = ChimeError::Invocation {
            message: "test".into(),
            source: None,
        };
        let _timestamp = ChimeError::InvalidTimestamp("test".into());
        let _internal = ChimeError::Internal("test".into());
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_clock<T: Clock>() {}
        fn _assert_timer<T: Timer>() {}
        fn _assert_handler<T: AlarmHandler>() {}
        _assert_clock::<SystemClock>();
        _assert_timer::<TokioTimer>();
    }
}
