// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use meeting::backends::types::FacingMode;
use meeting::{Config, PlatformBackend};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(
        config.start_camera_off,
        "Camera should start off until explicitly toggled"
    );
    assert!(!config.start_muted, "Microphone should start enabled");
    assert_eq!(config.backend, PlatformBackend::PipeWire);
    assert_eq!(config.display_name, "You");
    assert_eq!(config.video.facing_mode, FacingMode::User);
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.backend = PlatformBackend::Simulated;
    config.start_muted = true;
    config.video.ideal_width = 640;
    config.video.ideal_height = 480;
    config.save_to(&path).expect("save");

    let loaded = Config::load_from(&path).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn test_config_invalid_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").expect("write");

    let result = Config::load_from(&path);
    assert!(result.is_err(), "Invalid JSON should not load");
}

#[test]
fn test_config_partial_video_section() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "video": { "ideal_width": 320 } }"#).expect("write");

    let config = Config::load_from(&path).expect("load");
    assert_eq!(config.video.ideal_width, 320);
    assert_eq!(config.video.ideal_height, 720);
    assert!(config.capture_audio);
}

#[test]
fn test_config_notice_duration() {
    let config = Config {
        notice_duration_ms: 1500,
        ..Config::default()
    };
    assert_eq!(config.notice_duration().as_millis(), 1500);
}

#[cfg(target_os = "linux")]
#[test]
fn test_missing_config_is_written_with_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    // Only test in this binary that reads the config location
    unsafe { std::env::set_var("XDG_CONFIG_HOME", dir.path()) };

    let path = Config::path().expect("config path");
    assert!(path.starts_with(dir.path()));
    assert!(!path.exists());

    let config = Config::load();

    assert_eq!(config, Config::default());
    assert!(path.exists(), "defaults written for editing");
    assert_eq!(Config::load_from(&path).expect("load"), config);
}
