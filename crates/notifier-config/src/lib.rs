// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the notifier queues.
//!
//! TOML files are merged along a system/user/local hierarchy, overridden by
//! `NOTIFIER_*` environment variables, checked with `deny_unknown_fields`, and
//! validated. Failures are reported as miette diagnostics with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use notifier_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("workers: {}", config.messages_queue.workers_num);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    LoggingConfig, MessagesQueueConfig, NotificationsQueueConfig, NotifierConfig, ServiceConfig,
    StorageConfig,
};

/// Loads the standard hierarchy and validates the result.
pub fn load_and_validate() -> Result<NotifierConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads an explicit config file (plus env overrides) and validates it.
pub fn load_and_validate_path(path: &Path) -> Result<NotifierConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources(std::iter::once(path.to_path_buf()))
    })
}

/// Parses an inline TOML document and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<NotifierConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

#[allow(clippy::result_large_err)]
fn finish(
    loaded: Result<NotifierConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<NotifierConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads the TOML files of the standard hierarchy for span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let cwd = std::env::current_dir().ok();
    read_sources(loader::config_paths().into_iter().map(|p| match &cwd {
        Some(dir) if p.is_relative() => dir.join(p),
        _ => p,
    }))
}

fn read_sources(paths: impl Iterator<Item = std::path::PathBuf>) -> Vec<(String, String)> {
    paths
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
