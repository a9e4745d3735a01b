// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for scheduled alarms.
//!
//! Provides a WAL-mode database with an idempotently created alarm table, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed operations
//! to upsert, delete, and list persisted alarms.

pub mod database;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::StoredAlarm;
