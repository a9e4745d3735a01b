// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::ChimeConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest accepted backoff exponent; `retry_start_seconds << 30` is already decades.
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Largest accepted first retry delay: one day.
pub const MAX_RETRY_START_SECONDS: u64 = 86_400;

/// Validate a deserialized configuration, collecting every error.
pub fn validate_config(config: &ChimeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    let scheduler = &config.scheduler;
    if scheduler.retry_start_seconds == 0 {
        invalid("scheduler.retry_start_seconds must be at least 1".to_string());
    }
    if scheduler.retry_start_seconds > MAX_RETRY_START_SECONDS {
        invalid(format!(
            "scheduler.retry_start_seconds must be at most {MAX_RETRY_START_SECONDS}, got {}",
            scheduler.retry_start_seconds
        ));
    }
    if scheduler.retry_max_tries == 0 {
        invalid("scheduler.retry_max_tries must be at least 1".to_string());
    }
    if scheduler.retry_backoff_max > MAX_BACKOFF_EXPONENT {
        invalid(format!(
            "scheduler.retry_backoff_max must be at most {MAX_BACKOFF_EXPONENT}, got {}",
            scheduler.retry_backoff_max
        ));
    }
    if !(0.0..=1.0).contains(&scheduler.retry_jitter_factor) {
        invalid(format!(
            "scheduler.retry_jitter_factor must be between 0 and 1, got {}",
            scheduler.retry_jitter_factor
        ));
    }

    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        invalid(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
