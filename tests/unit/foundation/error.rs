use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        VitrineError::config_invalid("x")
            .to_string()
            .contains("invalid configuration:")
    );
    assert!(
        VitrineError::resource_load_failed("x")
            .to_string()
            .contains("resource load failed:")
    );
    assert!(VitrineError::timeout("x").to_string().contains("timed out:"));
    assert!(
        VitrineError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn partial_construction_lists_failed_children() {
    let err = VitrineError::PartialConstruction {
        node: "MainPage".to_string(),
        failed: vec!["logo".to_string(), "title".to_string()],
    };
    let msg = err.to_string();
    assert!(msg.contains("MainPage"));
    assert!(msg.contains("2 child(ren)"));
    assert!(msg.contains("logo, title"));
}

#[test]
fn only_cancelled_reports_cancelled() {
    assert!(VitrineError::Cancelled.is_cancelled());
    assert!(!VitrineError::ShutDown.is_cancelled());
    assert!(!VitrineError::resource_load_failed("font").is_cancelled());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = VitrineError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
