// SPDX-License-Identifier: GPL-3.0-only

//! In-memory camera handle
//!
//! Stands in for a native capture session: it keeps the hardware state a real
//! session would have (active device, attached outputs, applied format and
//! device properties), records every successful mutating call in order, and
//! lets callers inject failures per operation. A [`SimulatedProbe`] obtained
//! before the camera is handed to the engine keeps access to all of it.

use super::CameraHandle;
use super::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A mutating call that reached the simulated hardware
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Lock,
    Unlock,
    SetZoom(f32),
    SetExposure(f32),
    SetTorch(bool),
    SetFlash(FlashMode),
    SelectDevice(CamSelector),
    AddOutput(CaptureMode),
    RemoveOutput(CaptureMode),
    ApplyFormat {
        width: u32,
        height: u32,
        frame_rate: Option<f64>,
        stabilization: Option<StabilizationMode>,
    },
}

impl PlatformCall {
    /// Check if the call changes which outputs or device are bound
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            PlatformCall::SelectDevice(_)
                | PlatformCall::AddOutput(_)
                | PlatformCall::RemoveOutput(_)
                | PlatformCall::ApplyFormat { .. }
        )
    }
}

impl std::fmt::Display for PlatformCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformCall::Lock => write!(f, "lock"),
            PlatformCall::Unlock => write!(f, "unlock"),
            PlatformCall::SetZoom(zoom) => write!(f, "set_zoom({})", zoom),
            PlatformCall::SetExposure(ev) => write!(f, "set_exposure({})", ev),
            PlatformCall::SetTorch(on) => write!(f, "set_torch({})", on),
            PlatformCall::SetFlash(mode) => write!(f, "set_flash({})", mode),
            PlatformCall::SelectDevice(selector) => write!(f, "select_device({})", selector),
            PlatformCall::AddOutput(mode) => write!(f, "add_output({})", mode),
            PlatformCall::RemoveOutput(mode) => write!(f, "remove_output({})", mode),
            PlatformCall::ApplyFormat {
                width,
                height,
                frame_rate,
                stabilization,
            } => write!(
                f,
                "apply_format({}x{}, fps={:?}, stabilization={:?})",
                width, height, frame_rate, stabilization
            ),
        }
    }
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOp {
    Capabilities,
    SupportedFormats,
    Lock,
    SetZoom,
    SetExposure,
    SetTorch,
    SetFlash,
    SelectDevice,
    AddOutput,
    RemoveOutput,
    ApplyFormat,
}

/// One physical device known to the simulated session
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub capabilities: Capabilities,
    pub formats: HashMap<CaptureMode, Vec<CaptureFormat>>,
}

impl SimulatedDevice {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            formats: HashMap::new(),
        }
    }

    /// Register the formats offered for one capture mode
    pub fn with_formats(mut self, mode: CaptureMode, formats: Vec<CaptureFormat>) -> Self {
        self.formats.insert(mode, formats);
        self
    }
}

/// Hardware state as seen by the simulated session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedState {
    pub active_device: Option<CamSelector>,
    pub outputs: Vec<CaptureMode>,
    pub format: Option<CaptureFormat>,
    pub frame_rate: Option<f64>,
    pub stabilization: Option<StabilizationMode>,
    pub zoom: Option<f32>,
    pub exposure: Option<f32>,
    pub torch: bool,
    pub flash: FlashMode,
    pub locked: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: SimulatedState,
    calls: Vec<PlatformCall>,
    failures: HashSet<SimulatedOp>,
}

/// Inspection and fault-injection handle for a [`SimulatedCamera`]
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedProbe {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All successful mutating calls so far, oldest first
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current hardware state
    pub fn state(&self) -> SimulatedState {
        self.lock().state.clone()
    }

    /// Make every subsequent `op` fail until [`SimulatedProbe::recover`]
    pub fn fail(&self, op: SimulatedOp) {
        self.lock().failures.insert(op);
    }

    pub fn recover(&self, op: SimulatedOp) {
        self.lock().failures.remove(&op);
    }
}

/// In-memory [`CameraHandle`]
#[derive(Debug)]
pub struct SimulatedCamera {
    devices: HashMap<CamSelector, SimulatedDevice>,
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedCamera {
    /// Create a session without any devices
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn with_device(mut self, selector: CamSelector, device: SimulatedDevice) -> Self {
        self.devices.insert(selector, device);
        self
    }

    /// A typical phone: a capable rear camera and a basic front camera
    pub fn phone() -> Self {
        let back_caps = Capabilities {
            min_zoom: 1.0,
            max_zoom: 10.0,
            min_exposure: -2.0,
            max_exposure: 2.0,
            flash_supported: true,
            torch_supported: true,
            zero_shutter_lag_supported: true,
        };
        let front_caps = Capabilities {
            min_zoom: 1.0,
            max_zoom: 4.0,
            min_exposure: -2.0,
            max_exposure: 2.0,
            flash_supported: false,
            torch_supported: false,
            zero_shutter_lag_supported: false,
        };

        let back_video = vec![
            fps_format(3840, 2160, 1.0, 30.0, 11).with_stabilization([
                StabilizationMode::Off,
                StabilizationMode::Standard,
                StabilizationMode::Cinematic,
            ]),
            fps_format(1920, 1080, 1.0, 60.0, 12)
                .with_stabilization([StabilizationMode::Off, StabilizationMode::Standard]),
            fps_format(1280, 720, 1.0, 120.0, 13).with_stabilization([StabilizationMode::Off]),
        ];
        let back = SimulatedDevice::new(back_caps)
            .with_formats(
                CaptureMode::Photo,
                vec![
                    fps_format(4032, 3024, 1.0, 30.0, 1).with_focus(true),
                    fps_format(1920, 1080, 1.0, 30.0, 2).with_focus(true),
                ],
            )
            .with_formats(CaptureMode::Video, back_video.clone())
            .with_formats(CaptureMode::Preview, back_video.clone())
            .with_formats(CaptureMode::AnalysisOnly, back_video);

        let front_video = vec![
            fps_format(1920, 1080, 1.0, 30.0, 31)
                .with_stabilization([StabilizationMode::Off, StabilizationMode::Standard]),
            fps_format(1280, 720, 1.0, 60.0, 32).with_stabilization([StabilizationMode::Off]),
        ];
        let front = SimulatedDevice::new(front_caps)
            .with_formats(
                CaptureMode::Photo,
                vec![fps_format(3264, 2448, 1.0, 30.0, 21)],
            )
            .with_formats(CaptureMode::Video, front_video.clone())
            .with_formats(CaptureMode::Preview, front_video.clone())
            .with_formats(CaptureMode::AnalysisOnly, front_video);

        Self::new()
            .with_device(CamSelector::Back, back)
            .with_device(CamSelector::Front, front)
    }

    /// Get a probe that stays valid after the camera is moved into an engine
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, op: SimulatedOp) -> BackendResult<()> {
        if self.lock().failures.contains(&op) {
            return Err(BackendError::CallFailed(format!("{:?} failed (injected)", op)));
        }
        Ok(())
    }

    fn active_device(&self) -> BackendResult<&SimulatedDevice> {
        let active = self.lock().state.active_device.clone();
        active
            .as_ref()
            .and_then(|selector| self.devices.get(selector))
            .ok_or_else(|| BackendError::DeviceNotFound("no active device".to_string()))
    }

    /// Apply `update` to the hardware state and record `call`
    fn record(&self, call: PlatformCall, update: impl FnOnce(&mut SimulatedState)) {
        debug!(call = %call, "Simulated platform call");
        let mut shared = self.lock();
        update(&mut shared.state);
        shared.calls.push(call);
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

fn fps_format(width: u32, height: u32, min_fps: f64, max_fps: f64, handle: u64) -> CaptureFormat {
    let mut format = CaptureFormat::new(width, height).with_handle(handle);
    format.min_fps = Some(min_fps);
    format.max_fps = Some(max_fps);
    format
}

impl CameraHandle for SimulatedCamera {
    fn capabilities(&self) -> BackendResult<Capabilities> {
        self.check(SimulatedOp::Capabilities)?;
        Ok(self.active_device()?.capabilities.clone())
    }

    fn supported_formats(&self, mode: CaptureMode) -> BackendResult<Vec<CaptureFormat>> {
        self.check(SimulatedOp::SupportedFormats)?;
        Ok(self
            .active_device()?
            .formats
            .get(&mode)
            .cloned()
            .unwrap_or_default())
    }

    fn lock_for_configuration(&mut self) -> BackendResult<()> {
        self.check(SimulatedOp::Lock)?;
        if self.lock().state.locked {
            return Err(BackendError::LockFailed("already locked".to_string()));
        }
        self.record(PlatformCall::Lock, |s| s.locked = true);
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {
        self.record(PlatformCall::Unlock, |s| s.locked = false);
    }

    fn set_zoom(&mut self, zoom: f32) -> BackendResult<()> {
        self.check(SimulatedOp::SetZoom)?;
        self.record(PlatformCall::SetZoom(zoom), |s| s.zoom = Some(zoom));
        Ok(())
    }

    fn set_exposure_compensation(&mut self, exposure: f32) -> BackendResult<()> {
        self.check(SimulatedOp::SetExposure)?;
        self.record(PlatformCall::SetExposure(exposure), |s| {
            s.exposure = Some(exposure)
        });
        Ok(())
    }

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()> {
        self.check(SimulatedOp::SetTorch)?;
        self.record(PlatformCall::SetTorch(enabled), |s| s.torch = enabled);
        Ok(())
    }

    fn set_flash(&mut self, mode: FlashMode) -> BackendResult<()> {
        self.check(SimulatedOp::SetFlash)?;
        self.record(PlatformCall::SetFlash(mode), |s| s.flash = mode);
        Ok(())
    }

    fn select_device(&mut self, selector: &CamSelector) -> BackendResult<()> {
        self.check(SimulatedOp::SelectDevice)?;
        if !self.devices.contains_key(selector) {
            return Err(BackendError::DeviceNotFound(selector.to_string()));
        }
        let selected = selector.clone();
        self.record(PlatformCall::SelectDevice(selector.clone()), |s| {
            s.active_device = Some(selected);
            // A new input invalidates the previously negotiated format
            s.format = None;
            s.frame_rate = None;
            s.stabilization = None;
        });
        Ok(())
    }

    fn add_output(&mut self, mode: CaptureMode) -> BackendResult<()> {
        self.check(SimulatedOp::AddOutput)?;
        if self.lock().state.outputs.contains(&mode) {
            return Err(BackendError::Other(format!("{} output already attached", mode)));
        }
        self.record(PlatformCall::AddOutput(mode), |s| s.outputs.push(mode));
        Ok(())
    }

    fn remove_output(&mut self, mode: CaptureMode) -> BackendResult<()> {
        self.check(SimulatedOp::RemoveOutput)?;
        self.record(PlatformCall::RemoveOutput(mode), |s| {
            s.outputs.retain(|m| *m != mode)
        });
        Ok(())
    }

    fn apply_format(
        &mut self,
        format: &CaptureFormat,
        frame_rate: Option<f64>,
        stabilization: Option<StabilizationMode>,
    ) -> BackendResult<()> {
        self.check(SimulatedOp::ApplyFormat)?;
        let applied = format.clone();
        self.record(
            PlatformCall::ApplyFormat {
                width: format.width,
                height: format.height,
                frame_rate,
                stabilization,
            },
            |s| {
                s.format = Some(applied);
                s.frame_rate = frame_rate;
                s.stabilization = stabilization;
            },
        );
        Ok(())
    }
}
