//! Integration tests for Settings loading with layered merge semantics.
//!
//! Merge Semantics:
//! - Defaults → Global → File: field-wise REPLACE (unset fields inherit)
//! - Any → Env vars: REPLACE (explicit user override)
//!
//! Note: These tests use explicit config files in temp directories; a global
//! config on the test machine would be merged underneath.

use std::fs;

use tempfile::TempDir;

use scopetree::application::ApplicationError;
use scopetree::config::{RawSettings, Settings};
use scopetree::domain::{PresentationBehavior, RetryBehavior};

#[test]
fn given_partial_file_when_from_file_then_unset_fields_keep_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scopetree.toml");
    fs::write(
        &path,
        r#"
default_retry = "siblings"

[render]
max_errors = 1
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).expect("load settings");

    assert_eq!(settings.default_retry, RetryBehavior::Siblings);
    assert_eq!(
        settings.default_presentation,
        PresentationBehavior::AcceptsSuppression
    );
    assert_eq!(settings.render.max_errors, 1);
    assert!(settings.render.show_tags);
    assert!(settings.render.show_errors);
}

#[test]
fn given_explicit_file_when_load_then_file_values_win() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        "default_presentation = \"prefers-display\"\n[render]\nshow_tags = false\n",
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(
        settings.default_presentation,
        PresentationBehavior::PrefersDisplay
    );
    assert!(!settings.render.show_tags);
}

#[test]
fn given_missing_explicit_file_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();

    let result = Settings::load(Some(&dir.path().join("absent.toml")));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_unknown_behavior_when_from_file_then_config_error_names_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "default_retry = \"cousins\"\n").unwrap();

    let err = Settings::from_file(&path).unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("config error: parse"), "{}", message);
    assert!(message.contains("bad.toml"), "{}", message);
}

#[test]
fn given_template_when_written_and_loaded_then_equals_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scopetree.toml");
    fs::write(&path, Settings::template()).unwrap();

    let settings = Settings::from_file(&path).expect("load template");

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_effective_settings_when_shown_then_reparse_as_raw_overlay() {
    let settings = Settings {
        default_retry: RetryBehavior::Descendants,
        ..Settings::default()
    };

    let text = settings.to_toml().unwrap();
    let raw: RawSettings = toml::from_str(&text).unwrap();

    assert_eq!(raw.default_retry, Some(RetryBehavior::Descendants));
    assert_eq!(raw.render.max_errors, Some(3));
}
