// SPDX-License-Identifier: GPL-3.0-only

//! Camera handle abstraction
//!
//! The reconciliation engine never talks to a native camera stack directly.
//! Each platform supplies a thin adapter implementing [`CameraHandle`], a
//! narrow set of primitive operations on a running capture session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ ReconciliationEngine │  ← Diffing, ordering, cancellation
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  CameraHandle Trait  │  ← Primitive platform operations
//! └──────────┬───────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ Platform adapter│  ← SimulatedCamera in this crate
//!   └─────────────────┘
//! ```

pub mod simulated;
pub mod types;

pub use simulated::{PlatformCall, SimulatedCamera, SimulatedDevice, SimulatedOp, SimulatedProbe};
pub use types::*;

use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Primitive operations of a platform camera session
///
/// Implementations translate each call into exactly one native operation and
/// must not cache or reorder anything; deciding *whether* a call is needed is
/// the engine's job.
pub trait CameraHandle: Send {
    // ===== Queries =====

    /// Hardware limits of the active device
    fn capabilities(&self) -> BackendResult<Capabilities>;

    /// Formats the active device supports for the output backing `mode`
    fn supported_formats(&self, mode: CaptureMode) -> BackendResult<Vec<CaptureFormat>>;

    // ===== Configuration lock =====

    /// Take the exclusive hardware configuration lock
    ///
    /// Prefer [`ConfigurationLock::acquire`], which guarantees the matching unlock.
    fn lock_for_configuration(&mut self) -> BackendResult<()>;

    /// Release the hardware configuration lock
    fn unlock_for_configuration(&mut self);

    // ===== Device properties =====

    fn set_zoom(&mut self, zoom: f32) -> BackendResult<()>;

    fn set_exposure_compensation(&mut self, exposure: f32) -> BackendResult<()>;

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()>;

    fn set_flash(&mut self, mode: FlashMode) -> BackendResult<()>;

    // ===== Topology =====

    /// Make the device matching `selector` the active input
    fn select_device(&mut self, selector: &CamSelector) -> BackendResult<()>;

    /// Attach the output used by `mode` to the pipeline
    fn add_output(&mut self, mode: CaptureMode) -> BackendResult<()>;

    /// Detach the output used by `mode` from the pipeline
    fn remove_output(&mut self, mode: CaptureMode) -> BackendResult<()>;

    /// Activate a format on the current output
    ///
    /// # Arguments
    /// * `format` - One of the formats returned by [`CameraHandle::supported_formats`]
    /// * `frame_rate` - Frame rate to lock within the format's range, if any
    /// * `stabilization` - Stabilization mode to enable, if any
    fn apply_format(
        &mut self,
        format: &CaptureFormat,
        frame_rate: Option<f64>,
        stabilization: Option<StabilizationMode>,
    ) -> BackendResult<()>;
}

/// Scoped hardware configuration lock
///
/// The lock is released when the guard is dropped, on every exit path.
pub struct ConfigurationLock<'a> {
    handle: &'a mut dyn CameraHandle,
}

impl<'a> ConfigurationLock<'a> {
    pub fn acquire(handle: &'a mut dyn CameraHandle) -> BackendResult<Self> {
        handle.lock_for_configuration()?;
        Ok(Self { handle })
    }
}

impl<'a> Deref for ConfigurationLock<'a> {
    type Target = dyn CameraHandle + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.handle
    }
}

impl DerefMut for ConfigurationLock<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.handle
    }
}

impl Drop for ConfigurationLock<'_> {
    fn drop(&mut self) {
        self.handle.unlock_for_configuration();
    }
}

/// Run `f` while holding the configuration lock
pub fn with_configuration_lock<T>(
    handle: &mut dyn CameraHandle,
    f: impl FnOnce(&mut dyn CameraHandle) -> BackendResult<T>,
) -> BackendResult<T> {
    let mut lock = ConfigurationLock::acquire(handle)?;
    f(&mut *lock)
}

/// Query capabilities, falling back to the conservative default
pub fn capabilities_or_default(handle: &dyn CameraHandle) -> Capabilities {
    match handle.capabilities() {
        Ok(caps) => caps,
        Err(e) => {
            warn!(error = %e, "Capability query failed, assuming no optional hardware");
            Capabilities::default()
        }
    }
}
