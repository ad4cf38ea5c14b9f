// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use camera_session::SessionConfig;
use camera_session::backends::camera::{CamSelector, CaptureMode, FlashMode};
use camera_session::format_picker::FormatConstraint;

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = SessionConfig::default();

    // Check sensible defaults
    assert_eq!(config.capture_mode, CaptureMode::Photo);
    assert_eq!(config.cam_selector, CamSelector::Back);
    assert_eq!(config.flash, FlashMode::Off);
    assert!(!config.torch, "Torch should be off by default");
    assert!(config.cam_format.is_unconstrained());
}

#[test]
fn test_config_default_path() {
    if let Some(path) = SessionConfig::default_path() {
        assert!(path.ends_with("camera-session/session.json"));
    }
}

#[test]
fn test_config_full_json() {
    let json = r#"{
        "capture_mode": "video",
        "cam_selector": { "device": "usb-cam" },
        "cam_format": [
            { "kind": "frame_rate", "fps": 60.0 },
            { "kind": "stabilization", "mode": "cinematic" }
        ],
        "zoom": 2.5,
        "exposure": -1.0,
        "flash": "auto",
        "torch": true
    }"#;

    let config = SessionConfig::from_json(json).unwrap();
    assert_eq!(config.capture_mode, CaptureMode::Video);
    assert_eq!(config.cam_selector, CamSelector::Device("usb-cam".to_string()));
    assert_eq!(config.cam_format.frame_rate(), Some(60.0));
    assert_eq!(config.zoom, Some(2.5));
    assert_eq!(config.flash, FlashMode::Auto);
    assert!(config.torch);
}

#[test]
fn test_constraint_strings_parse() {
    let constraint: FormatConstraint = "fps=30".parse().unwrap();
    assert_eq!(constraint, FormatConstraint::frame_rate(30.0));
    assert!("fps=fast".parse::<FormatConstraint>().is_err());
}
