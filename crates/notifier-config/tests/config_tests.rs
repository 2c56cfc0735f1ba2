// SPDX-FileCopyrightText: 2026 Notifier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the notifier configuration system.

use figment::Jail;
use notifier_config::diagnostic::ConfigError;
use notifier_config::model::NotifierConfig;
use notifier_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

/// A document touching every section deserializes into the matching fields.
#[test]
fn valid_toml_deserializes_into_notifier_config() {
    let toml = r#"
[service]
name = "notifier-test"
server_id = "node-2"

[logging]
level = "debug"

[storage]
database_path = "/tmp/queues.db"
wal_mode = false
busy_timeout_ms = 250
retries_num = 5
retries_interval_ms = 20
op_timeout_ms = 1500

[messages_queue]
fetch_delay_ms = 10
max_processing_time_ms = 3000
workers_num = 4

[notifications_queue]
fetch_delay_ms = 25
workers_num = 2
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "notifier-test");
    assert_eq!(config.service.server_id, "node-2");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/queues.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.storage.retries_num, 5);
    assert_eq!(config.storage.retries_interval().as_millis(), 20);
    assert_eq!(config.storage.op_timeout().as_millis(), 1500);
    assert_eq!(config.messages_queue.fetch_delay().as_millis(), 10);
    assert_eq!(config.messages_queue.max_processing_time().as_secs(), 3);
    assert_eq!(config.messages_queue.workers_num, 4);
    assert_eq!(config.notifications_queue.fetch_delay().as_millis(), 25);
    assert_eq!(config.notifications_queue.workers_num, 2);
}

/// An empty document yields the compiled defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "notifier");
    assert_eq!(config.service.server_id, "local");
    assert_eq!(config.logging.level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.retries_num, 3);
    assert_eq!(config.storage.retries_interval_ms, 100);
    assert_eq!(config.storage.op_timeout_ms, 5000);
    assert_eq!(config.messages_queue.fetch_delay_ms, 50);
    assert_eq!(config.messages_queue.max_processing_time_ms, 20_000);
    assert_eq!(config.messages_queue.workers_num, 10);
    assert_eq!(config.notifications_queue.fetch_delay_ms, 50);
    assert_eq!(config.notifications_queue.workers_num, 10);
}

/// Unknown key inside a section is rejected.
#[test]
fn unknown_field_in_section_produces_error() {
    let toml = r#"
[messages_queue]
fetch_dealy_ms = 10
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("fetch_dealy_ms"),
        "error should mention the bad key, got: {err_str}"
    );
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[mongo]
url = "mongodb://localhost"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Unknown key diagnostics carry a suggestion and the accepted keys.
#[test]
fn diagnostic_suggests_close_key() {
    let toml = r#"
[storage]
retry_num = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key.ends_with("retry_num")
                && suggestion.as_deref() == Some("retries_num")
                && valid_keys.contains("op_timeout_ms")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

/// Wrong value type is reported as InvalidType.
#[test]
fn diagnostic_invalid_type() {
    let toml = r#"
[notifications_queue]
workers_num = "many"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("workers_num"))),
        "got: {errors:?}"
    );
}

/// Help text of an unknown key diagnostic mentions the suggestion.
#[test]
fn config_error_help_contains_suggestion() {
    use miette::Diagnostic;

    let error = ConfigError::UnknownKey {
        key: "storage.retry_num".to_string(),
        suggestion: Some("retries_num".to_string()),
        valid_keys: "retries_num, retries_interval_ms".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `retries_num`"), "got: {help}");
}

/// Diagnostics render with miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::Validation {
        key: "messages_queue.workers_num".to_string(),
        message: "must be at least 1".to_string(),
    };

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("messages_queue.workers_num"));
}

/// Validation runs after a successful parse.
#[test]
fn validation_rejects_zero_workers() {
    let toml = r#"
[messages_queue]
workers_num = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero workers should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { key, .. } if key == "messages_queue.workers_num")
    ));
}

/// Figment skips config files that do not exist.
#[test]
fn missing_config_file_is_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: NotifierConfig = Figment::new()
        .merge(Serialized::defaults(NotifierConfig::default()))
        .merge(Toml::file("/nonexistent/path/notifier.toml"))
        .extract()
        .expect("missing file should be skipped");
    assert_eq!(config.service.name, "notifier");
}

/// `NOTIFIER_*` variables override values from the file, including keys
/// whose section name contains underscores.
#[test]
#[serial]
fn env_vars_override_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[service]
server_id = "from-file"

[messages_queue]
workers_num = 3
"#,
        )?;
        jail.set_env("NOTIFIER_SERVICE_SERVER_ID", "from-env");
        jail.set_env("NOTIFIER_MESSAGES_QUEUE_MAX_PROCESSING_TIME_MS", "60000");

        let config = load_and_validate_path(std::path::Path::new("custom.toml"))
            .map_err(|e| format!("{e:?}"))?;
        assert_eq!(config.service.server_id, "from-env");
        assert_eq!(config.messages_queue.workers_num, 3);
        assert_eq!(config.messages_queue.max_processing_time_ms, 60_000);
        Ok(())
    });
}

/// A typo in a real file is reported with a suggestion.
#[test]
#[serial]
fn unknown_key_in_file_is_reported() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[logging]\nlevle = \"debug\"\n")?;
        let path = jail.directory().join("custom.toml");

        let errors = load_and_validate_path(&path).expect_err("typo should fail");
        let reported = errors.iter().any(|e| {
            matches!(e, ConfigError::UnknownKey { suggestion, .. }
                if suggestion.as_deref() == Some("level"))
        });
        assert!(reported, "got: {errors:?}");
        Ok(())
    });
}
