// SPDX-License-Identifier: GPL-3.0-only

//! Session-wide constants

use crate::backends::camera::types::{CamSelector, CaptureMode, FlashMode};
use crate::session::pending::PendingKey;

/// Capture mode used when no configuration says otherwise
pub const DEFAULT_CAPTURE_MODE: CaptureMode = CaptureMode::Photo;

/// Exposure compensation in EV that every reset returns to
pub const DEFAULT_EXPOSURE: f32 = 0.0;

/// Flash mode that every reset returns to
pub const DEFAULT_FLASH: FlashMode = FlashMode::Off;

/// Torch state that every reset returns to
pub const DEFAULT_TORCH: bool = false;

/// Camera used when no configuration says otherwise
pub fn default_selector() -> CamSelector {
    CamSelector::Back
}

/// Order in which buffered writes reach the hardware once the session runs
pub const REPLAY_ORDER: [PendingKey; 4] = [
    PendingKey::Zoom,
    PendingKey::Exposure,
    PendingKey::Torch,
    PendingKey::Flash,
];

/// Capacity of the asynchronous error channel
pub const ERROR_CHANNEL_CAPACITY: usize = 32;

/// Name of the configuration directory and file
pub mod paths {
    pub const APP_DIR: &str = "camera-session";
    pub const CONFIG_FILE: &str = "session.json";
}
