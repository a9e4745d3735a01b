// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chime alarm scheduler.

use thiserror::Error;

/// The primary error type used across the scheduler, storage, and handler traits.
#[derive(Debug, Error)]
pub enum ChimeError {
    /// Configuration errors (invalid TOML, out-of-range retry settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, WAL checkpoint).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An alarm fired for a namespace that was never registered.
    #[error("namespace `{unique_key}` is not registered")]
    NamespaceNotRegistered { unique_key: String },

    /// The alarm handler failed outside of its normal result channel
    /// (transport failure, crashed isolate, internal error).
    #[error("alarm invocation failed: {message}")]
    Invocation {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A timestamp cannot be represented as nanoseconds since the Unix epoch.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChimeError {
    /// Shorthand for an [`ChimeError::Invocation`] without a source error.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
            source: None,
        }
    }
}
