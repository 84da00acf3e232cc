use super::*;

#[test]
fn placement_flips_y_for_top_left_positions() {
    let p = Placement::from_top_left(
        Vec2::new(40.0, 120.0),
        Some(Vec2::new(300.0, 80.0)),
        Euler::ZERO,
    );
    assert_eq!(p.anchored, Vec2::new(40.0, -120.0));
    assert_eq!(p.size, Some(Size::new(300.0, 80.0)));

    let local = Placement::local(Vec2::new(5.0, 6.0), Euler::ZERO);
    assert_eq!(local.anchored, Vec2::new(5.0, 6.0));
    assert_eq!(local.size, None);
}

#[test]
fn rgba_accepts_hex_object_and_array() {
    let hex: Rgba = serde_json::from_str("\"#ff000080\"").unwrap();
    assert_eq!(hex.r, 1.0);
    assert!((hex.a - 128.0 / 255.0).abs() < 1e-6);

    let obj: Rgba = serde_json::from_str(r#"{"r":0.5,"g":0.25,"b":0.0}"#).unwrap();
    assert_eq!(obj, Rgba::new(0.5, 0.25, 0.0, 1.0));

    let arr: Rgba = serde_json::from_str("[0.1, 0.2, 0.3, 0.4]").unwrap();
    assert_eq!(arr, Rgba::new(0.1, 0.2, 0.3, 0.4));

    assert!(serde_json::from_str::<Rgba>("[0.1, 0.2]").is_err());
    assert!(serde_json::from_str::<Rgba>("\"#abc\"").is_err());
}

#[test]
fn euler_defaults_missing_axes() {
    let e: Euler = serde_json::from_str(r#"{"z":15.0}"#).unwrap();
    assert_eq!(e, Euler { x: 0.0, y: 0.0, z: 15.0 });
    assert!(e.is_finite());
}
