use ledmap_core::{BitDepth, ChannelOrder, CoreError, LedConfig, LedType, WhiteMethod};
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

fn temp_with_extension(ext: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(ext).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_json_config() {
    let file = temp_with_extension(
        ".json",
        r#"{
            "target_ip": "10.0.0.20",
            "start_universe": 4,
            "fps": 40,
            "bit_depth": 16,
            "delta_encoding": {"threshold": 12, "full_frame_interval": 60},
            "universe_configs": {"default": "GRB", "5": "BGR"},
            "led_type": "RGBW",
            "white": {"enabled": true, "method": "luminance"}
        }"#,
    );

    let config = LedConfig::load(file.path()).unwrap();
    assert_eq!(config.target_ip, "10.0.0.20");
    assert_eq!(config.start_universe, 4);
    assert_eq!(config.fps, 40);
    assert_eq!(config.bit_depth, BitDepth::Sixteen);
    assert_eq!(config.delta_encoding.threshold, 12);
    // Unspecified nested values keep their defaults
    assert_eq!(config.delta_encoding.threshold_16bit, 2048);
    assert!(config.delta_encoding.enabled);
    assert_eq!(config.delta_threshold(), 2048);
    assert_eq!(config.universe_configs.order_for(5), ChannelOrder::Bgr);
    assert_eq!(config.universe_configs.order_for(4), ChannelOrder::Grb);
    assert_eq!(config.led_type, LedType::Rgbw);
    assert_eq!(config.white.method, WhiteMethod::Luminance);
}

#[test]
fn test_load_toml_config() {
    let file = temp_with_extension(
        ".toml",
        r#"
target_ip = "192.168.0.255"
fps = 25

[universe_configs]
default = "RGB"
2 = "GBR"

[playback]
max_loops = 3
"#,
    );

    let config = LedConfig::load(file.path()).unwrap();
    assert_eq!(config.fps, 25);
    assert_eq!(config.universe_configs.order_for(2), ChannelOrder::Gbr);
    assert_eq!(config.playback.max_loops, 3);
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = temp_with_extension(".json", r#"{"fps": 120}"#);
    assert!(matches!(
        LedConfig::load(file.path()),
        Err(CoreError::InvalidConfig(_))
    ));

    let file = temp_with_extension(".json", r#"{"target_ip": "not-an-ip"}"#);
    assert!(LedConfig::load(file.path()).is_err());

    let file = temp_with_extension(".json", r#"{"channels_per_universe": 600}"#);
    assert!(LedConfig::load(file.path()).is_err());

    let file = temp_with_extension(".json", r#"{"universe_configs": {"default": "RGBW"}}"#);
    assert!(LedConfig::load(file.path()).is_err());
}

#[test]
fn test_unsupported_extension() {
    let file = temp_with_extension(".yaml", "fps: 30");
    assert!(matches!(
        LedConfig::load(file.path()),
        Err(CoreError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_save_and_reload() {
    let mut config = LedConfig::default();
    config.fps = 50;
    config.universe_configs.set(7, ChannelOrder::Rbg);

    let file = Builder::new().suffix(".json").tempfile().unwrap();
    config.save(file.path()).unwrap();

    let loaded = LedConfig::load(file.path()).unwrap();
    assert_eq!(loaded, config);
}
