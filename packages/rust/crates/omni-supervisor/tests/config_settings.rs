#![allow(missing_docs)]

use std::fs;
use std::time::Duration;

use omni_supervisor::{
    DEFAULT_BIND, DriverKind, ServeConfig, SupervisorSettings, load_runtime_settings_from_paths,
};

#[test]
fn user_settings_override_system_field_by_field() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("system.yaml");
    let user = dir.path().join("user.yaml");
    fs::write(
        &system,
        r"
supervisor:
  concurrency: 8
  bind: 0.0.0.0:9000
  driver: scan
  tick_interval_ms: 1000
",
    )
    .unwrap();
    fs::write(
        &user,
        r"
supervisor:
  concurrency: 2
  driver: update
",
    )
    .unwrap();

    let settings = load_runtime_settings_from_paths(&system, &user).supervisor;
    assert_eq!(settings.concurrency, Some(2));
    assert_eq!(settings.driver.as_deref(), Some("update"));
    assert_eq!(settings.bind.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(settings.tick_interval_ms, Some(1000));
    assert_eq!(settings.scan_probes, None);
}

#[test]
fn missing_or_invalid_files_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("missing.yaml");
    let user = dir.path().join("broken.yaml");
    fs::write(&user, "supervisor: [not, a, map").unwrap();

    let settings = load_runtime_settings_from_paths(&system, &user).supervisor;
    assert_eq!(settings.concurrency, None);
    assert_eq!(settings.bind, None);
}

#[test]
fn empty_file_is_treated_as_no_settings() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("system.yaml");
    let user = dir.path().join("user.yaml");
    fs::write(&system, "supervisor:\n  update_steps: 7\n").unwrap();
    fs::write(&user, "").unwrap();

    let settings = load_runtime_settings_from_paths(&system, &user).supervisor;
    assert_eq!(settings.update_steps, Some(7));
}

#[test]
fn serve_config_defaults_without_settings() {
    let config = ServeConfig::from_settings(&SupervisorSettings::default());
    assert_eq!(config.bind, DEFAULT_BIND);
    assert_eq!(config.registry.concurrency, 4);
    assert_eq!(config.driver.kind, DriverKind::Scan);
    assert_eq!(config.driver.tick_interval, Duration::from_secs(1));
    assert_eq!(config.driver.scan_probes, 100);
    assert_eq!(config.driver.update_steps, 100);
}

#[test]
fn serve_config_applies_settings_and_ignores_unknown_driver() {
    let settings = SupervisorSettings {
        concurrency: Some(6),
        bind: Some("  ".to_string()),
        driver: Some("reboot".to_string()),
        tick_interval_ms: Some(250),
        scan_probes: Some(12),
        update_steps: Some(5),
    };
    let config = ServeConfig::from_settings(&settings);
    assert_eq!(config.bind, DEFAULT_BIND);
    assert_eq!(config.registry.concurrency, 6);
    assert_eq!(config.driver.kind, DriverKind::Scan);
    assert_eq!(config.driver.tick_interval, Duration::from_millis(250));
    assert_eq!(config.driver.scan_probes, 12);
    assert_eq!(config.driver.update_steps, 5);
}
