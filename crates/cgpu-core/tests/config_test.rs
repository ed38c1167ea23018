//! Integration test: CgpuConfig parsing and defaults
//!
//! Run with: cargo test -p cgpu-core --test config_test

use cgpu_core::config::{default_config_path, CgpuConfig};
use cgpu_core::CoreError;

#[test]
fn test_defaults() {
    let config = CgpuConfig::default();
    assert_eq!(config.instance.app_name, "cgpu");
    assert_eq!(config.instance.app_version, [0, 1, 0]);
    assert_eq!(config.instance.validation, None);
    assert_eq!(config.instance.validation_enabled(), cfg!(debug_assertions));
    assert_eq!(config.device.index, 0);
    assert_eq!(config.stores.devices, 1);
    assert_eq!(config.stores.images, 64);
    assert_eq!(config.stores.samplers, 64);
    assert_eq!(config.stores.pipelines, 8);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = CgpuConfig::from_toml(
        r#"
        [instance]
        app_name = "gatling"
        validation = false

        [stores]
        buffers = 128
        "#,
    )
    .expect("parse config");

    assert_eq!(config.instance.app_name, "gatling");
    assert!(!config.instance.validation_enabled());
    assert_eq!(config.instance.app_version, [0, 1, 0]);
    assert_eq!(config.stores.buffers, 128);
    assert_eq!(config.stores.fences, 8);
}

#[test]
fn test_invalid_toml_is_config_error() {
    match CgpuConfig::from_toml("[stores]\nbuffers = \"many\"") {
        Err(CoreError::Config(msg)) => println!("rejected: {}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_load_or_default_missing_file() {
    let config = CgpuConfig::load_or_default("/nonexistent/cgpu/cgpu.toml");
    assert_eq!(config, CgpuConfig::default());
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("cgpu_config_test_{}.toml", std::process::id()));
    std::fs::write(&path, "[device]\nindex = 2\n").expect("write config");
    let config = CgpuConfig::load(path.to_str().expect("utf-8 path")).expect("load config");
    std::fs::remove_file(&path).ok();
    assert_eq!(config.device.index, 2);
}

#[test]
fn test_default_config_path_is_toml() {
    assert!(default_config_path().ends_with(".toml") || std::env::var("CGPU_CONFIG").is_ok());
}
