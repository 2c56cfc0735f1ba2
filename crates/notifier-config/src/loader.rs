// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/notifier/notifier.toml`,
//! `~/.config/notifier/notifier.toml`, `./notifier.toml`, `NOTIFIER_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NotifierConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/notifier/notifier.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "notifier.toml";

/// Top-level sections, used to turn `NOTIFIER_<SECTION>_<KEY>` into `section.key`.
const SECTIONS: &[&str] = &[
    "service",
    "logging",
    "storage",
    "messages_queue",
    "notifications_queue",
];

/// Per-user configuration file under the platform config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("notifier").join("notifier.toml"))
}

/// Every file the standard hierarchy reads, lowest priority first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    paths.extend(user_config_path());
    paths.push(PathBuf::from(LOCAL_CONFIG_PATH));
    paths
}

/// Builds the standard Figment without extracting it.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(NotifierConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Loads configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<NotifierConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from an inline TOML document on top of the defaults.
///
/// Environment variables are not consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<NotifierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NotifierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from an explicit file, skipping the standard lookup.
pub fn load_config_from_path(path: &Path) -> Result<NotifierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NotifierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `NOTIFIER_MESSAGES_QUEUE_FETCH_DELAY_MS` to `messages_queue.fetch_delay_ms`.
///
/// Section names contain underscores themselves, so splitting on `_` would be
/// ambiguous; known section prefixes are matched instead.
fn env_provider() -> Env {
    Env::prefixed("NOTIFIER_").map(|key| env_key_to_path(key.as_str()).into())
}

pub(crate) fn env_key_to_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or(key)
}
