use super::*;

#[test]
fn font_map_is_exact_match_with_passthrough() {
    let map = FontMap::new([
        ("font1".to_string(), "Fonts/NotoSans SDF".to_string()),
        ("font2".to_string(), String::new()),
    ]);
    assert_eq!(map.resolve("font1"), "Fonts/NotoSans SDF");
    assert_eq!(map.resolve("Font1"), "Font1");
    assert_eq!(map.resolve("font"), "font");
    assert_eq!(map.resolve("font2"), "font2");
    assert_eq!(map.len(), 2);
}

#[test]
fn settings_defaults_fill_missing_sections() {
    let settings = Settings::from_json_str(r#"{"fontMap": {"font1": "Fonts/A"}}"#).unwrap();
    assert_eq!(settings.inactivity_time, 60.0);
    assert_eq!(settings.templates, TemplateKeys::default());
    assert_eq!(settings.video.prepare_timeout(), Duration::from_secs(10));
    assert_eq!(settings.video.poll_interval(), Duration::from_millis(16));
    assert_eq!(settings.font_map.resolve("font1"), "Fonts/A");
}

#[test]
fn settings_lookup_pages_and_popups_by_name() {
    let settings = Settings::from_json_str(
        r#"{
            "sounds": [{"key": "click", "clipPath": "click.wav"}],
            "pages": [{"name": "Main"}],
            "popups": [{"name": "Help"}]
        }"#,
    )
    .unwrap();
    assert_eq!(settings.sounds[0].volume, 1.0);
    assert!(settings.page("Main").is_some());
    assert!(settings.popup("Help").is_some());
    assert!(settings.popup("Main").is_none());
}

#[test]
fn settings_reject_bad_values() {
    assert!(matches!(
        Settings::from_json_str(r#"{"inactivityTime": -1}"#),
        Err(VitrineError::ConfigInvalid(_))
    ));
    assert!(matches!(
        Settings::from_json_str(r#"{"video": {"prepareTimeoutSecs": 0}}"#),
        Err(VitrineError::ConfigInvalid(_))
    ));
    assert!(matches!(
        Settings::from_json_str(r#"{"templates": {"text": " "}}"#),
        Err(VitrineError::ConfigInvalid(_))
    ));
    assert!(matches!(
        Settings::from_json_str("{not json"),
        Err(VitrineError::Serde(_))
    ));
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Settings.json");
    std::fs::write(&path, r#"{"fadeDuration": 0.5}"#).unwrap();
    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.fade_duration, 0.5);

    assert!(Settings::load(dir.path().join("missing.json")).is_err());
}
