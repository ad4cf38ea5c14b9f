// SPDX-License-Identifier: GPL-3.0-only

//! Reconciliation engine
//!
//! The single entry point callers use to configure a camera session. It owns
//! the platform handle and routes every request:
//!
//! - device property writes (zoom, exposure, torch, flash) run inline on the
//!   caller's thread while the session runs, and are buffered otherwise
//! - topology writes (capture mode, camera selector, capture format) go to the
//!   [`SessionTopologyManager`]; selector and format changes are debounced
//!   background tasks whose failures arrive on the error channel
//! - lifecycle events are pushed in by the caller

use super::appliers::{self, ApplyMode};
use super::lifecycle::SessionPhase;
use super::pending::{PendingConfigBuffer, PendingWrite};
use super::store::ConfigurationStore;
use super::topology::{
    ActiveFormat, SessionTopologyManager, SessionTopologyState, TopologyKind, TopologyTask,
};
use crate::backends::camera::types::{
    CamSelector, Capabilities, CaptureMode, FlashMode, HardwareEvent,
};
use crate::backends::camera::CameraHandle;
use crate::config::SessionConfig;
use crate::constants::ERROR_CHANNEL_CAPACITY;
use crate::errors::{SessionError, SessionResult, WriteOutcome};
use crate::format_picker::CamFormat;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Declarative configuration surface over one camera session
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    handle: Mutex<Box<dyn CameraHandle>>,
    store: ConfigurationStore,
    pending: PendingConfigBuffer,
    topology: SessionTopologyManager,
    capabilities: RwLock<Capabilities>,
    phase: watch::Sender<SessionPhase>,
    /// Set on pause; the next resume forces zoom and exposure back onto the hardware
    has_paused: AtomicBool,
    errors: broadcast::Sender<SessionError>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("phase", &self.phase())
            .field("topology", &self.inner.store.topology())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl ReconciliationEngine {
    /// Create an engine for `handle`
    ///
    /// The configured topology becomes the desired topology; the configured
    /// device properties are buffered and reach the hardware once the session
    /// runs.
    pub fn new(handle: impl CameraHandle + 'static, config: &SessionConfig) -> Self {
        let store = ConfigurationStore::new(config);
        let topology = SessionTopologyManager::new(store.topology());
        let pending = PendingConfigBuffer::new();

        if let Some(zoom) = config.zoom {
            pending.set(PendingWrite::Zoom(zoom));
        }
        pending.set(PendingWrite::Exposure(config.exposure));
        pending.set(PendingWrite::Torch(config.torch));
        pending.set(PendingWrite::Flash(config.flash));

        let (phase, _) = watch::channel(SessionPhase::NotInitialized);
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(EngineInner {
                handle: Mutex::new(Box::new(handle)),
                store,
                pending,
                topology,
                capabilities: RwLock::new(Capabilities::default()),
                phase,
                has_paused: AtomicBool::new(false),
                errors,
            }),
        }
    }

    // ===== Device property setters =====

    pub fn set_zoom(&self, zoom: f32) -> SessionResult<WriteOutcome> {
        self.inner.write_device_property(PendingWrite::Zoom(zoom))
    }

    pub fn set_exposure(&self, exposure: f32) -> SessionResult<WriteOutcome> {
        self.inner.write_device_property(PendingWrite::Exposure(exposure))
    }

    pub fn set_torch(&self, enabled: bool) -> SessionResult<WriteOutcome> {
        self.inner.write_device_property(PendingWrite::Torch(enabled))
    }

    /// Set the flash mode; anything but `Off` needs photo mode
    pub fn set_flash(&self, flash: FlashMode) -> SessionResult<WriteOutcome> {
        self.inner.write_device_property(PendingWrite::Flash(flash))
    }

    // ===== Topology setters =====

    /// Switch capture mode, cancelling any pending topology change
    ///
    /// Completes once the hardware matches; platform failures are returned
    /// directly. Before the session runs the request is only recorded.
    pub async fn set_capture_mode(&self, mode: CaptureMode) -> SessionResult<WriteOutcome> {
        self.inner.ensure_not_disposed("capture mode")?;
        self.inner.topology.request_capture_mode(mode);
        if !self.phase().is_running() {
            debug!(mode = %mode, "Capture mode recorded until session runs");
            return Ok(WriteOutcome::Deferred);
        }

        self.inner.topology.cancel_all();
        let _session = self.inner.topology.lock_session().await;
        self.inner.reconcile_if_running(TopologyKind::CaptureMode)
    }

    /// Switch camera in the background
    ///
    /// A newer selector request cancels this one if it has not started yet.
    pub fn set_cam_selector(&self, selector: CamSelector) -> SessionResult<TopologyTask> {
        self.inner.ensure_not_disposed("camera selector")?;
        self.inner.topology.request_cam_selector(selector);
        self.schedule(TopologyKind::CamSelector)
    }

    /// Change format constraints in the background
    ///
    /// A newer format request cancels this one if it has not started yet.
    pub fn set_cam_format(&self, format: CamFormat) -> SessionResult<TopologyTask> {
        self.inner.ensure_not_disposed("capture format")?;
        self.inner.topology.request_cam_format(format);
        self.schedule(TopologyKind::CamFormat)
    }

    fn schedule(&self, kind: TopologyKind) -> SessionResult<TopologyTask> {
        if !self.phase().is_running() {
            debug!(kind = %kind, "Topology change recorded until session runs");
            return Ok(TopologyTask::deferred(kind));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SessionError::LifecycleViolation(format!("{} change needs a tokio runtime", kind))
        })?;

        let inner = Arc::clone(&self.inner);
        let join = self.inner.topology.replace_task(kind, move |generation| {
            runtime.spawn(async move {
                let result = {
                    let _session = inner.topology.lock_session().await;
                    inner.reconcile_if_running(kind)
                };
                inner.topology.finish_task(kind, generation);
                if let Err(e) = &result {
                    inner.report(e.clone());
                }
                result
            })
        });
        Ok(TopologyTask::spawned(kind, join))
    }

    // ===== Getters =====

    pub fn capture_mode(&self) -> CaptureMode {
        self.inner.store.capture_mode.read()
    }

    pub fn cam_selector(&self) -> CamSelector {
        self.inner.store.cam_selector.read()
    }

    pub fn cam_format(&self) -> CamFormat {
        self.inner.store.cam_format.read()
    }

    pub fn zoom(&self) -> f32 {
        self.inner.store.zoom.read()
    }

    pub fn exposure(&self) -> f32 {
        self.inner.store.exposure.read()
    }

    pub fn torch(&self) -> bool {
        self.inner.store.torch.read()
    }

    pub fn flash(&self) -> FlashMode {
        self.inner.store.flash.read()
    }

    /// Topology requested by the caller, which may not be committed yet
    pub fn desired_topology(&self) -> SessionTopologyState {
        self.inner.topology.desired()
    }

    /// Hardware limits of the active device
    ///
    /// Falls back to a conservative default until a device is bound or when
    /// the platform cannot answer.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities_snapshot()
    }

    pub fn active_format(&self) -> Option<ActiveFormat> {
        self.inner.topology.active_format()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.phase()
    }

    // ===== Observation =====

    /// Committed properties, each with its own `subscribe()`
    pub fn store(&self) -> &ConfigurationStore {
        &self.inner.store
    }

    pub fn topology(&self) -> &SessionTopologyManager {
        &self.inner.topology
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    /// Failures of work whose caller already returned
    pub fn subscribe_errors(&self) -> broadcast::Receiver<SessionError> {
        self.inner.errors.subscribe()
    }

    // ===== Hardware notifications =====

    /// Commit a value the hardware changed on its own
    pub fn handle_hardware_event(&self, event: HardwareEvent) -> SessionResult<WriteOutcome> {
        self.inner.ensure_not_disposed("hardware event")?;
        debug!(event = ?event, "Hardware state changed externally");
        let store = &self.inner.store;
        match event {
            HardwareEvent::ZoomChanged(zoom) => store.zoom.write(zoom),
            HardwareEvent::ExposureChanged(exposure) => store.exposure.write(exposure),
            HardwareEvent::TorchChanged(enabled) => store.torch.write(enabled),
            HardwareEvent::FlashChanged(flash) => store.flash.write(flash),
        }
    }

    /// Feed hardware notifications from `events` until the channel closes or
    /// the session is disposed
    pub fn spawn_hardware_listener(&self, mut events: mpsc::Receiver<HardwareEvent>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if engine.phase().is_terminal() {
                    break;
                }
                if let Err(e) = engine.handle_hardware_event(event) {
                    warn!(event = ?event, error = %e, "Failed to commit hardware event");
                }
            }
            debug!("Hardware listener stopped");
        })
    }

    // ===== Lifecycle =====

    /// Bind the configured device and outputs
    pub async fn initialize(&self) -> SessionResult<()> {
        self.inner.transition(SessionPhase::Initializing)?;
        let _session = self.inner.topology.lock_session().await;
        self.inner.reconcile(TopologyKind::CaptureMode, true)?;
        Ok(())
    }

    /// The session started delivering frames
    ///
    /// Applies topology requested before now, then replays buffered writes.
    /// Replay failures go to the error channel.
    pub async fn on_running(&self) -> SessionResult<()> {
        self.inner.transition(SessionPhase::Running)?;
        let topology = {
            let _session = self.inner.topology.lock_session().await;
            self.inner.reconcile(TopologyKind::CaptureMode, false)
        };
        self.inner.replay_pending();
        topology.map(|_| ())
    }

    pub fn on_paused(&self) -> SessionResult<()> {
        self.inner.transition(SessionPhase::Paused)?;
        self.inner.has_paused.store(true, Ordering::Release);
        Ok(())
    }

    /// The session is running again after a pause
    pub async fn on_resumed(&self) -> SessionResult<()> {
        self.inner.transition(SessionPhase::Running)?;
        let topology = {
            let _session = self.inner.topology.lock_session().await;
            self.inner.reconcile(TopologyKind::CaptureMode, false)
        };

        if self.inner.has_paused.swap(false, Ordering::AcqRel) {
            self.inner.reapply_after_pause();
        }
        self.inner.replay_pending();
        topology.map(|_| ())
    }

    /// Tear the session down; every later write fails
    pub fn dispose(&self) -> SessionResult<()> {
        // Held across the transition so no in-flight write reaches the
        // handle after teardown
        let mut handle = self.inner.lock_handle();
        self.inner.transition(SessionPhase::Disposed)?;
        self.inner.topology.cancel_all();
        self.inner.store.close();
        self.inner.pending.clear();

        self.inner.topology.teardown(&mut **handle);
        info!("Camera session disposed");
        Ok(())
    }
}

impl EngineInner {
    fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    fn lock_handle(&self) -> MutexGuard<'_, Box<dyn CameraHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the handle for a platform call, failing if dispose got there first
    fn lock_live_handle(
        &self,
        what: &str,
    ) -> SessionResult<MutexGuard<'_, Box<dyn CameraHandle>>> {
        let guard = self.lock_handle();
        self.ensure_not_disposed(what)?;
        Ok(guard)
    }

    fn capabilities_snapshot(&self) -> Capabilities {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_not_disposed(&self, what: &str) -> SessionResult<()> {
        if self.phase().is_terminal() {
            return Err(SessionError::LifecycleViolation(format!(
                "{} written after dispose",
                what
            )));
        }
        Ok(())
    }

    fn transition(&self, next: SessionPhase) -> SessionResult<()> {
        let mut result = Ok(());
        self.phase.send_if_modified(|current| {
            if current.can_transition_to(next) {
                info!(from = %current, to = %next, "Session phase changed");
                *current = next;
                true
            } else {
                result = Err(SessionError::LifecycleViolation(format!(
                    "cannot go from {} to {}",
                    current, next
                )));
                false
            }
        });
        result
    }

    fn report(&self, err: SessionError) {
        error!(error = %err, "Session error");
        // No receivers is fine
        let _ = self.errors.send(err);
    }

    // ===== Device properties =====

    fn write_device_property(&self, write: PendingWrite) -> SessionResult<WriteOutcome> {
        let phase = self.phase();
        if phase.is_terminal() {
            return Err(SessionError::LifecycleViolation(format!(
                "{:?} written after dispose",
                write.key()
            )));
        }
        if !phase.is_running() {
            self.pending.set(write);
            return Ok(WriteOutcome::Deferred);
        }
        self.apply_write(write, ApplyMode::Reconcile)
    }

    fn apply_write(&self, write: PendingWrite, mode: ApplyMode) -> SessionResult<WriteOutcome> {
        let caps = self.capabilities_snapshot();
        let mut guard = self.lock_live_handle(&format!("{:?}", write.key()))?;
        let handle: &mut dyn CameraHandle = &mut **guard;
        let store = &self.store;

        match write {
            PendingWrite::Zoom(zoom) => appliers::apply_zoom(handle, store, &caps, zoom, mode),
            PendingWrite::Exposure(exposure) => {
                appliers::apply_exposure(handle, store, &caps, exposure, mode)
            }
            PendingWrite::Torch(enabled) => appliers::apply_torch(handle, store, &caps, enabled, mode),
            PendingWrite::Flash(flash) => appliers::apply_flash(
                handle,
                store,
                &caps,
                store.capture_mode.read(),
                flash,
                mode,
            ),
        }
    }

    fn replay_pending(&self) {
        if self.pending.is_empty() {
            return;
        }
        debug!(count = self.pending.len(), "Replaying buffered writes");
        for err in self
            .pending
            .replay(|write| self.apply_write(write, ApplyMode::Reconcile))
        {
            self.report(err);
        }
    }

    /// Some platforms silently drop zoom and exposure across a pause
    fn reapply_after_pause(&self) {
        let zoom = PendingWrite::Zoom(self.store.zoom.read());
        let exposure = PendingWrite::Exposure(self.store.exposure.read());
        for write in [zoom, exposure] {
            if let Err(e) = self.apply_write(write, ApplyMode::Force) {
                warn!(write = ?write, error = %e, "Failed to reapply after pause");
                self.report(e);
            }
        }
    }

    // ===== Topology =====

    /// Reconcile with the session lock held
    fn reconcile(&self, kind: TopologyKind, rebuild: bool) -> SessionResult<WriteOutcome> {
        let mut handle = self.lock_live_handle(&kind.to_string())?;
        self.topology
            .reconcile(kind, &mut **handle, &self.store, &self.capabilities, rebuild)
    }

    /// Reconcile with the session lock held, unless the session stopped running
    /// while the request waited
    fn reconcile_if_running(&self, kind: TopologyKind) -> SessionResult<WriteOutcome> {
        self.ensure_not_disposed(&kind.to_string())?;
        if !self.phase().is_running() {
            return Ok(WriteOutcome::Deferred);
        }
        self.reconcile(kind, false)
    }
}
