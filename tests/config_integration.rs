//! Configuration loading from files and environment variables.

use std::path::PathBuf;

use serial_test::serial;
use slant_rig::config::RigConfig;

fn clear_env() {
    for key in [
        "SLANT_EXPERIMENT__FIXATION_MS",
        "SLANT_DISPLAY__FULLSCREEN",
        "SLANT_DATA__DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn repository_defaults_load() {
    clear_env();
    let config = RigConfig::load().unwrap();
    assert_eq!(config.experiment.name, "3D_SLANT_RELIEF");
    assert_eq!(config.experiment.height_ratios, vec![0.06, 0.08]);
    assert_eq!(config.display.screen_width, 59.5);
    assert_eq!(config.sensor.executable, PathBuf::from("inclinometer"));
    assert_eq!(config.assets.font_path, PathBuf::from("assets/DejaVuSans.ttf"));
}

#[test]
#[serial]
fn env_overrides_files() {
    clear_env();
    std::env::set_var("SLANT_EXPERIMENT__FIXATION_MS", "750");
    std::env::set_var("SLANT_DISPLAY__FULLSCREEN", "false");
    std::env::set_var("SLANT_DATA__DIR", "/tmp/slant-data");
    let config = RigConfig::load();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.experiment.fixation_ms, 750);
    assert!(!config.display.fullscreen);
    assert_eq!(config.data.dir, PathBuf::from("/tmp/slant-data"));
}

#[test]
#[serial]
fn user_file_overrides_default_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("default.toml"),
        "[experiment]\nfixation_ms = 600\ntotal_sessions = 3\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("user.toml"), "[experiment]\nfixation_ms = 400\n").unwrap();

    let config = RigConfig::load_from(dir.path()).unwrap();
    assert_eq!(config.experiment.fixation_ms, 400);
    assert_eq!(config.experiment.total_sessions, 3);
}

#[test]
#[serial]
fn malformed_value_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("default.toml"), "[experiment]\nfixation_ms = \"soon\"\n").unwrap();
    let err = RigConfig::load_from(dir.path()).unwrap_err();
    assert!(err.to_string().contains("configuration error"));
}
