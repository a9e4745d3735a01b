// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chime.toml` > `~/.config/chime/chime.toml` > `/etc/chime/chime.toml`
//! with environment variable overrides via the `CHIME_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChimeConfig;

/// Top-level sections that `CHIME_<SECTION>_<KEY>` variables map into.
const ENV_SECTIONS: &[&str] = &["storage", "scheduler", "log"];

/// Config files in merge order (later overrides earlier).
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/chime/chime.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("chime").join("chime.toml"));
    }
    paths.push(PathBuf::from("chime.toml"));
    paths
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chime/chime.toml`
/// 3. `~/.config/chime/chime.toml`
/// 4. `./chime.toml`
/// 5. `CHIME_*` environment variables
pub fn load_config() -> Result<ChimeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChimeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChimeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChimeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChimeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    config_file_candidates()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(ChimeConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// `CHIME_SCHEDULER_RETRY_MAX_TRIES` -> `scheduler.retry_max_tries`.
///
/// Only the section prefix is split off; key names keep their underscores.
fn env_provider() -> Env {
    Env::prefixed("CHIME_").map(|key| map_env_key(key.as_str()).into())
}

/// Figment hands over env keys uppercase; sections and fields are lowercase.
fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| key.to_string())
}
