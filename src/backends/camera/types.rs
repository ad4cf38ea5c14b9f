// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera handle abstraction

//! Shared types for camera handles

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which hardware output the capture pipeline is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Still image capture
    #[default]
    Photo,
    /// Video recording
    Video,
    /// Preview only, no capture output attached
    Preview,
    /// Frame analysis output without preview
    AnalysisOnly,
}

impl CaptureMode {
    /// Get all capture modes for iteration
    pub const ALL: [CaptureMode; 4] = [
        CaptureMode::Photo,
        CaptureMode::Video,
        CaptureMode::Preview,
        CaptureMode::AnalysisOnly,
    ];
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
            CaptureMode::Preview => write!(f, "preview"),
            CaptureMode::AnalysisOnly => write!(f, "analysis"),
        }
    }
}

/// Lens selector for the active capture device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CamSelector {
    /// Front-facing (selfie) camera
    Front,
    /// Rear camera
    #[default]
    Back,
    /// A specific device by platform identifier (external cameras, secondary lenses)
    Device(String),
}

impl std::fmt::Display for CamSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CamSelector::Front => write!(f, "front"),
            CamSelector::Back => write!(f, "back"),
            CamSelector::Device(id) => write!(f, "device:{}", id),
        }
    }
}

/// Flash operating mode for still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    /// Flash never fires
    #[default]
    Off,
    /// Flash fires on every capture
    On,
    /// Flash fires when the scene is dark
    Auto,
}

impl std::fmt::Display for FlashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashMode::Off => write!(f, "off"),
            FlashMode::On => write!(f, "on"),
            FlashMode::Auto => write!(f, "auto"),
        }
    }
}

/// Video stabilization mode
///
/// Ordering matters: when a format does not support the requested mode the
/// first supported non-off mode in this order is used instead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationMode {
    #[default]
    Off,
    Standard,
    Cinematic,
    CinematicExtended,
    Auto,
}

impl StabilizationMode {
    /// Parse a stabilization mode from its lowercase name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" => Some(StabilizationMode::Off),
            "standard" => Some(StabilizationMode::Standard),
            "cinematic" => Some(StabilizationMode::Cinematic),
            "cinematic_extended" | "cinematic-extended" => {
                Some(StabilizationMode::CinematicExtended)
            }
            "auto" => Some(StabilizationMode::Auto),
            _ => None,
        }
    }
}

impl std::fmt::Display for StabilizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StabilizationMode::Off => write!(f, "off"),
            StabilizationMode::Standard => write!(f, "standard"),
            StabilizationMode::Cinematic => write!(f, "cinematic"),
            StabilizationMode::CinematicExtended => write!(f, "cinematic_extended"),
            StabilizationMode::Auto => write!(f, "auto"),
        }
    }
}

/// Opaque platform token identifying a native format object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct FormatHandle(pub u64);

/// A capture configuration exposed by the platform for one output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub focus_supported: bool,
    #[serde(default)]
    pub min_fps: Option<f64>,
    #[serde(default)]
    pub max_fps: Option<f64>,
    /// `None` when the platform does not report stabilization at all
    #[serde(default)]
    pub stabilization_modes: Option<BTreeSet<StabilizationMode>>,
    #[serde(default)]
    pub handle: FormatHandle,
}

impl CaptureFormat {
    /// Create a format with only a resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            focus_supported: false,
            min_fps: None,
            max_fps: None,
            stabilization_modes: None,
            handle: FormatHandle::default(),
        }
    }

    /// Attach a frame rate range, rejecting inverted bounds
    pub fn with_fps_range(mut self, min_fps: f64, max_fps: f64) -> BackendResult<Self> {
        if min_fps > max_fps {
            return Err(BackendError::FormatNotSupported(format!(
                "inverted frame rate range {}..{}",
                min_fps, max_fps
            )));
        }
        self.min_fps = Some(min_fps);
        self.max_fps = Some(max_fps);
        Ok(self)
    }

    /// Attach only an upper frame rate bound
    pub fn with_max_fps(mut self, max_fps: f64) -> Self {
        self.max_fps = Some(max_fps);
        self
    }

    pub fn with_stabilization<I>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = StabilizationMode>,
    {
        self.stabilization_modes = Some(modes.into_iter().collect());
        self
    }

    pub fn with_focus(mut self, supported: bool) -> Self {
        self.focus_supported = supported;
        self
    }

    pub fn with_handle(mut self, handle: u64) -> Self {
        self.handle = FormatHandle(handle);
        self
    }

    /// Width divided by height (infinite for a zero height)
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Total pixel count
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Frame rate range, filling a missing bound from the other one
    pub fn fps_range(&self) -> Option<(f64, f64)> {
        match (self.min_fps, self.max_fps) {
            (Some(min), Some(max)) => Some((min, max)),
            (Some(only), None) | (None, Some(only)) => Some((only, only)),
            (None, None) => None,
        }
    }

    /// Check whether the fps bounds are consistent
    pub fn is_valid(&self) -> bool {
        match (self.min_fps, self.max_fps) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }

    /// Check if the format supports the given stabilization mode
    pub fn supports_stabilization(&self, mode: StabilizationMode) -> bool {
        self.stabilization_modes
            .as_ref()
            .is_some_and(|modes| modes.contains(&mode))
    }

    /// First supported mode other than `Off`
    pub fn first_active_stabilization(&self) -> Option<StabilizationMode> {
        self.stabilization_modes
            .as_ref()?
            .iter()
            .copied()
            .find(|mode| *mode != StabilizationMode::Off)
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fps_range() {
            Some((min, max)) if min == max => {
                write!(f, "{}x{} @ {}fps", self.width, self.height, max)
            }
            Some((min, max)) => write!(f, "{}x{} @ {}-{}fps", self.width, self.height, min, max),
            None => write!(f, "{}x{}", self.width, self.height),
        }
    }
}

/// Hardware limits of the active device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub min_exposure: f32,
    pub max_exposure: f32,
    pub flash_supported: bool,
    pub torch_supported: bool,
    pub zero_shutter_lag_supported: bool,
}

impl Default for Capabilities {
    /// Conservative snapshot used when the platform cannot answer
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 1.0,
            min_exposure: 0.0,
            max_exposure: 0.0,
            flash_supported: false,
            torch_supported: false,
            zero_shutter_lag_supported: false,
        }
    }
}

impl Capabilities {
    pub fn zoom_in_range(&self, zoom: f32) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }

    pub fn exposure_in_range(&self, exposure: f32) -> bool {
        exposure >= self.min_exposure && exposure <= self.max_exposure
    }
}

/// Hardware state changed outside of the engine (pinch gesture handled natively,
/// torch switched off by the thermal governor, ...)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HardwareEvent {
    ZoomChanged(f32),
    ExposureChanged(f32),
    TorchChanged(bool),
    FlashChanged(FlashMode),
}

/// Result type for handle operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for handle operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Requested device does not exist
    DeviceNotFound(String),
    /// Format or output not supported
    FormatNotSupported(String),
    /// The configuration lock could not be taken
    LockFailed(String),
    /// Native call failed
    CallFailed(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::LockFailed(msg) => write!(f, "Configuration lock failed: {}", msg),
            BackendError::CallFailed(msg) => write!(f, "Native call failed: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
