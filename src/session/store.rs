// SPDX-License-Identifier: GPL-3.0-only

//! Committed session configuration
//!
//! One [`ConfigurableProperty`] per configuration dimension. Values here are
//! what the hardware has actually been told; buffered and in-flight requests
//! live elsewhere until they commit.

use super::property::ConfigurableProperty;
use super::topology::SessionTopologyState;
use crate::backends::camera::types::{CamSelector, CaptureMode, FlashMode};
use crate::config::SessionConfig;
use crate::constants::{DEFAULT_EXPOSURE, DEFAULT_FLASH, DEFAULT_TORCH};
use crate::errors::{SessionResult, WriteOutcome};
use crate::format_picker::CamFormat;

/// Smallest zoom or exposure difference treated as a change
const FLOAT_TOLERANCE: f32 = 1e-4;

fn float_changed(old: &f32, new: &f32) -> bool {
    (old - new).abs() > FLOAT_TOLERANCE
}

/// Identifies one configuration dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CaptureMode,
    CamSelector,
    CamFormat,
    Zoom,
    Exposure,
    Flash,
    Torch,
}

impl ConfigKey {
    /// Check if changing this key alters the attached outputs
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            ConfigKey::CaptureMode | ConfigKey::CamSelector | ConfigKey::CamFormat
        )
    }
}

/// A value for one configuration dimension
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    CaptureMode(CaptureMode),
    CamSelector(CamSelector),
    CamFormat(CamFormat),
    Zoom(f32),
    Exposure(f32),
    Flash(FlashMode),
    Torch(bool),
}

impl ConfigValue {
    pub fn key(&self) -> ConfigKey {
        match self {
            ConfigValue::CaptureMode(_) => ConfigKey::CaptureMode,
            ConfigValue::CamSelector(_) => ConfigKey::CamSelector,
            ConfigValue::CamFormat(_) => ConfigKey::CamFormat,
            ConfigValue::Zoom(_) => ConfigKey::Zoom,
            ConfigValue::Exposure(_) => ConfigKey::Exposure,
            ConfigValue::Flash(_) => ConfigKey::Flash,
            ConfigValue::Torch(_) => ConfigKey::Torch,
        }
    }
}

/// Committed value of every configurable property
#[derive(Debug)]
pub struct ConfigurationStore {
    pub capture_mode: ConfigurableProperty<CaptureMode>,
    pub cam_selector: ConfigurableProperty<CamSelector>,
    pub cam_format: ConfigurableProperty<CamFormat>,
    pub zoom: ConfigurableProperty<f32>,
    pub exposure: ConfigurableProperty<f32>,
    pub flash: ConfigurableProperty<FlashMode>,
    pub torch: ConfigurableProperty<bool>,
}

impl ConfigurationStore {
    /// Create a store whose topology starts at the configured values and whose
    /// device properties start at their reset baseline
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            capture_mode: ConfigurableProperty::new("capture_mode", config.capture_mode),
            cam_selector: ConfigurableProperty::new("cam_selector", config.cam_selector.clone()),
            cam_format: ConfigurableProperty::new("cam_format", config.cam_format.clone()),
            zoom: ConfigurableProperty::new("zoom", 1.0).with_predicate(float_changed),
            exposure: ConfigurableProperty::new("exposure", DEFAULT_EXPOSURE)
                .with_predicate(float_changed),
            flash: ConfigurableProperty::new("flash", DEFAULT_FLASH),
            torch: ConfigurableProperty::new("torch", DEFAULT_TORCH),
        }
    }

    /// Read the committed value for `key`
    pub fn read(&self, key: ConfigKey) -> ConfigValue {
        match key {
            ConfigKey::CaptureMode => ConfigValue::CaptureMode(self.capture_mode.read()),
            ConfigKey::CamSelector => ConfigValue::CamSelector(self.cam_selector.read()),
            ConfigKey::CamFormat => ConfigValue::CamFormat(self.cam_format.read()),
            ConfigKey::Zoom => ConfigValue::Zoom(self.zoom.read()),
            ConfigKey::Exposure => ConfigValue::Exposure(self.exposure.read()),
            ConfigKey::Flash => ConfigValue::Flash(self.flash.read()),
            ConfigKey::Torch => ConfigValue::Torch(self.torch.read()),
        }
    }

    /// Commit a value without any platform call
    pub fn write(&self, value: ConfigValue) -> SessionResult<WriteOutcome> {
        match value {
            ConfigValue::CaptureMode(v) => self.capture_mode.write(v),
            ConfigValue::CamSelector(v) => self.cam_selector.write(v),
            ConfigValue::CamFormat(v) => self.cam_format.write(v),
            ConfigValue::Zoom(v) => self.zoom.write(v),
            ConfigValue::Exposure(v) => self.exposure.write(v),
            ConfigValue::Flash(v) => self.flash.write(v),
            ConfigValue::Torch(v) => self.torch.write(v),
        }
    }

    /// Committed topology trio
    pub fn topology(&self) -> SessionTopologyState {
        SessionTopologyState {
            capture_mode: self.capture_mode.read(),
            cam_selector: self.cam_selector.read(),
            cam_format: self.cam_format.read(),
        }
    }

    /// Refuse all further writes
    pub fn close(&self) {
        self.capture_mode.close();
        self.cam_selector.close();
        self.cam_format.close();
        self.zoom.close();
        self.exposure.close();
        self.flash.close();
        self.torch.close();
    }

    pub fn is_closed(&self) -> bool {
        self.torch.is_closed()
    }
}
