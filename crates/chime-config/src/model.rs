// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chime alarm scheduler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Chime configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChimeConfig {
    /// Alarm database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retry policy for failed alarm deliveries.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Alarm database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite file holding the alarm table.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chime").join("alarms.sqlite"))
        .unwrap_or_else(|| std::path::PathBuf::from("alarms.sqlite"))
        .to_string_lossy()
        .into_owned()
}

/// Retry behavior of the alarm scheduler.
///
/// The delay before retry `n` is `retry_start_seconds << min(n, retry_backoff_max)`
/// seconds plus up to `retry_jitter_factor` of that delay as random jitter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// First retry delay in seconds.
    #[serde(default = "default_retry_start_seconds")]
    pub retry_start_seconds: u64,

    /// Retries that count against the limit before the alarm is dropped.
    #[serde(default = "default_retry_max_tries")]
    pub retry_max_tries: u32,

    /// Ceiling on the backoff exponent.
    #[serde(default = "default_retry_backoff_max")]
    pub retry_backoff_max: u32,

    /// Maximum jitter as a fraction of the un-jittered delay.
    #[serde(default = "default_retry_jitter_factor")]
    pub retry_jitter_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_start_seconds: default_retry_start_seconds(),
            retry_max_tries: default_retry_max_tries(),
            retry_backoff_max: default_retry_backoff_max(),
            retry_jitter_factor: default_retry_jitter_factor(),
        }
    }
}

fn default_retry_start_seconds() -> u64 {
    2
}

fn default_retry_max_tries() -> u32 {
    6
}

fn default_retry_backoff_max() -> u32 {
    9
}

fn default_retry_jitter_factor() -> f64 {
    0.25
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Level for `chime` targets (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.retry_start_seconds, 2);
        assert_eq!(config.retry_max_tries, 6);
        assert_eq!(config.retry_backoff_max, 9);
        assert!((config.retry_jitter_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn default_database_file_name() {
        let config = StorageConfig::default();
        assert!(config.database_path.ends_with("alarms.sqlite"));
    }

    #[test]
    fn partial_scheduler_section_keeps_other_defaults() {
        let config: ChimeConfig = toml::from_str(
            r#"
[scheduler]
retry_max_tries = 3
"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.retry_max_tries, 3);
        assert_eq!(config.scheduler.retry_start_seconds, 2);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn scheduler_denies_unknown_fields() {
        let result = toml::from_str::<ChimeConfig>(
            r#"
[scheduler]
retry_max = 3
"#,
        );
        assert!(result.is_err());
    }
}
