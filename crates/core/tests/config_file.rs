use lava_core::{ConfigError, FrameArgs, FrameConfig};

#[test]
fn test_save_then_resolve_from_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("frame.toml");

    let config = FrameConfig {
        app_name: "lava triangle".to_string(),
        triple_buffer: false,
        clear_color: [0.1, 0.2, 0.3],
        ..Default::default()
    };
    config.save(&path).expect("save config");

    let args = FrameArgs {
        config: Some(path),
        utils: true,
        ..Default::default()
    };
    let resolved = FrameConfig::resolve(&args).expect("resolve config");

    assert_eq!(resolved.app_name, "lava triangle");
    assert!(!resolved.triple_buffer);
    assert_eq!(resolved.clear_color, [0.1, 0.2, 0.3]);
    assert!(resolved.utils);
}

#[test]
fn test_load_reports_broken_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[window\nwidth = 3").expect("write file");

    match FrameConfig::load(&path) {
        Err(ConfigError::Parse(_)) => {}
        other => panic!("expected parse error, got {other:?}"),
    }
}
