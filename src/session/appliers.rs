// SPDX-License-Identifier: GPL-3.0-only

//! Device property appliers
//!
//! One function per device property, shared by the public setters, buffered
//! replay, resume and topology resets. Each validates the value against the
//! capability snapshot, issues the platform call and commits through the
//! store.

use super::property::ConfigurableProperty;
use super::store::ConfigurationStore;
use crate::backends::camera::types::{Capabilities, CaptureMode, FlashMode};
use crate::backends::camera::{CameraHandle, with_configuration_lock};
use crate::constants::DEFAULT_EXPOSURE;
use crate::errors::{SessionError, SessionResult, WriteOutcome};
use std::fmt::Debug;
use tracing::debug;

/// How an applier treats a value equal to the committed one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Skip the platform call when the predicate rejects the value
    Reconcile,
    /// Always call the platform, then commit as usual
    Force,
}

/// Run `call` against the hardware and commit `value` according to `mode`
fn commit<T>(
    property: &ConfigurableProperty<T>,
    value: T,
    mode: ApplyMode,
    call: impl FnOnce() -> SessionResult<()>,
) -> SessionResult<WriteOutcome>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    match mode {
        ApplyMode::Reconcile => property.try_write(value, |_, _| call()),
        ApplyMode::Force => {
            call()?;
            property.write(value)
        }
    }
}

pub fn apply_zoom(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
    zoom: f32,
    mode: ApplyMode,
) -> SessionResult<WriteOutcome> {
    if !caps.zoom_in_range(zoom) {
        return Err(SessionError::UnsupportedValue(format!(
            "zoom {} outside {}..{}",
            zoom, caps.min_zoom, caps.max_zoom
        )));
    }

    commit(&store.zoom, zoom, mode, || {
        Ok(with_configuration_lock(handle, |h| h.set_zoom(zoom))?)
    })
}

pub fn apply_exposure(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
    exposure: f32,
    mode: ApplyMode,
) -> SessionResult<WriteOutcome> {
    if !caps.exposure_in_range(exposure) {
        return Err(SessionError::UnsupportedValue(format!(
            "exposure {} outside {}..{}",
            exposure, caps.min_exposure, caps.max_exposure
        )));
    }

    commit(&store.exposure, exposure, mode, || {
        Ok(with_configuration_lock(handle, |h| {
            h.set_exposure_compensation(exposure)
        })?)
    })
}

pub fn apply_torch(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
    enabled: bool,
    mode: ApplyMode,
) -> SessionResult<WriteOutcome> {
    if !caps.torch_supported {
        if enabled {
            return Err(SessionError::UnsupportedValue(
                "torch not available on this device".to_string(),
            ));
        }
        // Nothing to switch off on the hardware
        debug!("Torch unsupported, committing off without platform call");
        return store.torch.write(false);
    }

    commit(&store.torch, enabled, mode, || {
        Ok(with_configuration_lock(handle, |h| h.set_torch(enabled))?)
    })
}

pub fn apply_flash(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
    capture_mode: CaptureMode,
    flash: FlashMode,
    mode: ApplyMode,
) -> SessionResult<WriteOutcome> {
    if flash != FlashMode::Off {
        if !caps.flash_supported {
            return Err(SessionError::UnsupportedValue(format!(
                "flash {} not available on this device",
                flash
            )));
        }
        if capture_mode != CaptureMode::Photo {
            return Err(SessionError::LifecycleViolation(format!(
                "flash {} requires photo mode, session is in {} mode",
                flash, capture_mode
            )));
        }
    } else if !caps.flash_supported {
        debug!("Flash unsupported, committing off without platform call");
        return store.flash.write(FlashMode::Off);
    }

    commit(&store.flash, flash, mode, || Ok(handle.set_flash(flash)?))
}

/// Nearest valid exposure to the neutral value
pub fn neutral_exposure(caps: &Capabilities) -> f32 {
    let max = caps.max_exposure.max(caps.min_exposure);
    DEFAULT_EXPOSURE.clamp(caps.min_exposure, max)
}

/// Reset applied when the capture mode changes: exposure and flash, zoom kept
pub fn reset_partial(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
) -> SessionResult<()> {
    apply_exposure(handle, store, caps, neutral_exposure(caps), ApplyMode::Force)?;
    apply_flash(
        handle,
        store,
        caps,
        store.capture_mode.read(),
        FlashMode::Off,
        ApplyMode::Force,
    )?;
    Ok(())
}

/// Reset applied when the device changes: every device property
pub fn reset_full(
    handle: &mut dyn CameraHandle,
    store: &ConfigurationStore,
    caps: &Capabilities,
) -> SessionResult<()> {
    apply_zoom(handle, store, caps, caps.min_zoom, ApplyMode::Force)?;
    apply_exposure(handle, store, caps, neutral_exposure(caps), ApplyMode::Force)?;
    apply_flash(
        handle,
        store,
        caps,
        store.capture_mode.read(),
        FlashMode::Off,
        ApplyMode::Force,
    )?;
    apply_torch(handle, store, caps, false, ApplyMode::Force)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{CamSelector, PlatformCall, SimulatedCamera, SimulatedOp};
    use crate::config::SessionConfig;

    fn running_back_camera() -> (SimulatedCamera, Capabilities) {
        let mut camera = SimulatedCamera::phone();
        camera.select_device(&CamSelector::Back).unwrap();
        let caps = camera.capabilities().unwrap();
        camera.probe().clear_calls();
        (camera, caps)
    }

    #[test]
    fn test_reconcile_skips_equal_value() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());

        let outcome = apply_zoom(&mut camera, &store, &caps, 1.0, ApplyMode::Reconcile).unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(camera.probe().calls().is_empty());
    }

    #[test]
    fn test_zoom_wrapped_in_configuration_lock() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());

        apply_zoom(&mut camera, &store, &caps, 2.5, ApplyMode::Reconcile).unwrap();
        assert_eq!(
            camera.probe().calls(),
            vec![
                PlatformCall::Lock,
                PlatformCall::SetZoom(2.5),
                PlatformCall::Unlock
            ]
        );
        assert_eq!(store.zoom.read(), 2.5);
    }

    #[test]
    fn test_force_calls_platform_for_equal_value() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());

        let outcome = apply_exposure(&mut camera, &store, &caps, 0.0, ApplyMode::Force).unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(camera.probe().calls().contains(&PlatformCall::SetExposure(0.0)));
    }

    #[test]
    fn test_platform_failure_leaves_value_uncommitted() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());
        camera.probe().fail(SimulatedOp::SetExposure);

        let err = apply_exposure(&mut camera, &store, &caps, 1.0, ApplyMode::Reconcile).unwrap_err();
        assert!(err.is_platform());
        assert_eq!(store.exposure.read(), 0.0);
        assert!(!camera.probe().state().locked);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());

        assert!(matches!(
            apply_zoom(&mut camera, &store, &caps, 50.0, ApplyMode::Reconcile),
            Err(SessionError::UnsupportedValue(_))
        ));
        assert!(matches!(
            apply_exposure(&mut camera, &store, &caps, -3.0, ApplyMode::Reconcile),
            Err(SessionError::UnsupportedValue(_))
        ));
        assert!(camera.probe().calls().is_empty());
    }

    #[test]
    fn test_flash_requires_photo_mode() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());

        let err = apply_flash(
            &mut camera,
            &store,
            &caps,
            CaptureMode::Video,
            FlashMode::On,
            ApplyMode::Reconcile,
        )
        .unwrap_err();
        assert!(err.is_lifecycle());

        let outcome = apply_flash(
            &mut camera,
            &store,
            &caps,
            CaptureMode::Photo,
            FlashMode::On,
            ApplyMode::Reconcile,
        )
        .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
    }

    #[test]
    fn test_torch_unsupported_on_front_camera() {
        let mut camera = SimulatedCamera::phone();
        camera.select_device(&CamSelector::Front).unwrap();
        let caps = camera.capabilities().unwrap();
        camera.probe().clear_calls();
        let store = ConfigurationStore::new(&SessionConfig::default());

        assert!(apply_torch(&mut camera, &store, &caps, true, ApplyMode::Reconcile).is_err());
        assert_eq!(
            apply_torch(&mut camera, &store, &caps, false, ApplyMode::Force).unwrap(),
            WriteOutcome::Unchanged
        );
        assert!(camera.probe().calls().is_empty());
    }

    #[test]
    fn test_full_reset_restores_baseline() {
        let (mut camera, caps) = running_back_camera();
        let store = ConfigurationStore::new(&SessionConfig::default());
        apply_zoom(&mut camera, &store, &caps, 4.0, ApplyMode::Reconcile).unwrap();
        apply_torch(&mut camera, &store, &caps, true, ApplyMode::Reconcile).unwrap();

        reset_full(&mut camera, &store, &caps).unwrap();

        assert_eq!(store.zoom.read(), caps.min_zoom);
        assert_eq!(store.exposure.read(), 0.0);
        assert_eq!(store.flash.read(), FlashMode::Off);
        assert!(!store.torch.read());
        assert!(!camera.probe().state().torch);
    }
}
