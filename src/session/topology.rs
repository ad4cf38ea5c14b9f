// SPDX-License-Identifier: GPL-3.0-only

//! Session topology management
//!
//! Capture mode, camera selector and capture format decide which hardware
//! outputs are attached. Changing any of them goes through this manager:
//!
//! - requests only update the *desired* topology; a reconciliation pass then
//!   diffs desired against committed and issues the platform calls
//! - passes are serialized by one async mutex per session
//! - a newer request for the same key aborts the pending pass for that key
//!   instead of queueing behind it
//! - the platform work of a pass is synchronous, so an abort can only land
//!   before it starts, never halfway through
//! - a pass that failed midway marks the topology dirty; the next pass tears
//!   down what is attached and rebuilds from scratch

use super::appliers::{self, ApplyMode};
use super::store::ConfigurationStore;
use crate::backends::camera::types::{
    CamSelector, Capabilities, CaptureFormat, CaptureMode, StabilizationMode,
};
use crate::backends::camera::{CameraHandle, capabilities_or_default};
use crate::errors::{SessionError, SessionResult, WriteOutcome};
use crate::format_picker::{CamFormat, derive_frame_rate, derive_stabilization, select_best};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// The configuration trio whose change requires output reattachment
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTopologyState {
    pub capture_mode: CaptureMode,
    pub cam_selector: CamSelector,
    pub cam_format: CamFormat,
}

/// Which topology key a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    CaptureMode,
    CamSelector,
    CamFormat,
}

impl std::fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyKind::CaptureMode => write!(f, "capture mode"),
            TopologyKind::CamSelector => write!(f, "camera selector"),
            TopologyKind::CamFormat => write!(f, "capture format"),
        }
    }
}

/// What the topology manager is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopologyStatus {
    #[default]
    Idle,
    Reconfiguring(TopologyKind),
}

/// Format currently applied to the hardware, with the values derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFormat {
    pub format: CaptureFormat,
    pub frame_rate: Option<f64>,
    pub stabilization: Option<StabilizationMode>,
}

/// Final state of a scheduled topology change
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyOutcome {
    /// The change reached the hardware and was committed
    Committed,
    /// Desired and committed topology already matched
    Unchanged,
    /// The session is not running; the change applies once it is
    Deferred,
    /// A newer request replaced this one before it ran
    Cancelled,
    /// The change failed; the error was also sent on the error channel
    Failed(SessionError),
}

/// Handle to a scheduled topology change
///
/// Dropping it does not cancel the change.
#[derive(Debug)]
pub struct TopologyTask {
    kind: TopologyKind,
    join: Option<JoinHandle<SessionResult<WriteOutcome>>>,
}

impl TopologyTask {
    pub(crate) fn deferred(kind: TopologyKind) -> Self {
        Self { kind, join: None }
    }

    pub(crate) fn spawned(kind: TopologyKind, join: JoinHandle<SessionResult<WriteOutcome>>) -> Self {
        Self {
            kind,
            join: Some(join),
        }
    }

    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    /// Wait for the change to finish
    pub async fn wait(self) -> TopologyOutcome {
        let Some(join) = self.join else {
            return TopologyOutcome::Deferred;
        };
        match join.await {
            Ok(Ok(WriteOutcome::Applied)) => TopologyOutcome::Committed,
            Ok(Ok(WriteOutcome::Deferred)) => TopologyOutcome::Deferred,
            Ok(Ok(WriteOutcome::Unchanged)) => TopologyOutcome::Unchanged,
            Ok(Err(e)) => TopologyOutcome::Failed(e),
            Err(e) if e.is_cancelled() => TopologyOutcome::Cancelled,
            Err(e) => TopologyOutcome::Failed(join_failure(e)),
        }
    }
}

fn join_failure(err: JoinError) -> SessionError {
    SessionError::PlatformCallFailure(crate::backends::camera::BackendError::Other(format!(
        "topology task panicked: {}",
        err
    )))
}

/// Serializes and applies topology changes
#[derive(Debug)]
pub struct SessionTopologyManager {
    desired: Mutex<SessionTopologyState>,
    session_lock: Arc<tokio::sync::Mutex<()>>,
    tasks: Mutex<HashMap<TopologyKind, (u64, AbortHandle)>>,
    generation: AtomicU64,
    /// Outputs this manager has attached and not yet removed
    attached: Mutex<Vec<CaptureMode>>,
    dirty: AtomicBool,
    active_format: RwLock<Option<ActiveFormat>>,
    status: watch::Sender<TopologyStatus>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionTopologyManager {
    pub fn new(initial: SessionTopologyState) -> Self {
        let (status, _) = watch::channel(TopologyStatus::Idle);
        Self {
            desired: Mutex::new(initial),
            session_lock: Arc::new(tokio::sync::Mutex::new(())),
            tasks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            attached: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
            active_format: RwLock::new(None),
            status,
        }
    }

    // ===== Desired state =====

    pub fn desired(&self) -> SessionTopologyState {
        lock(&self.desired).clone()
    }

    pub fn request_capture_mode(&self, mode: CaptureMode) {
        lock(&self.desired).capture_mode = mode;
    }

    pub fn request_cam_selector(&self, selector: CamSelector) {
        lock(&self.desired).cam_selector = selector;
    }

    pub fn request_cam_format(&self, format: CamFormat) {
        lock(&self.desired).cam_format = format;
    }

    // ===== Observation =====

    pub fn status(&self) -> TopologyStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TopologyStatus> {
        self.status.subscribe()
    }

    pub fn active_format(&self) -> Option<ActiveFormat> {
        self.active_format
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attached_outputs(&self) -> Vec<CaptureMode> {
        lock(&self.attached).clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    // ===== Task bookkeeping =====

    /// Wait for exclusive access to the topology
    pub async fn lock_session(&self) -> tokio::sync::OwnedMutexGuard<()> {
        Arc::clone(&self.session_lock).lock_owned().await
    }

    /// Abort the pending pass for `kind` and register a new one built by `spawn`
    pub fn replace_task<F>(&self, kind: TopologyKind, spawn: F) -> JoinHandle<SessionResult<WriteOutcome>>
    where
        F: FnOnce(u64) -> JoinHandle<SessionResult<WriteOutcome>>,
    {
        let mut tasks = lock(&self.tasks);
        if let Some((generation, previous)) = tasks.remove(&kind) {
            debug!(kind = %kind, generation, "Cancelling superseded topology change");
            previous.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let join = spawn(generation);
        tasks.insert(kind, (generation, join.abort_handle()));
        join
    }

    /// Forget a finished pass unless a newer one already replaced it
    pub fn finish_task(&self, kind: TopologyKind, generation: u64) {
        let mut tasks = lock(&self.tasks);
        if tasks.get(&kind).is_some_and(|(g, _)| *g == generation) {
            tasks.remove(&kind);
        }
    }

    /// Abort every pending pass
    pub fn cancel_all(&self) {
        for (kind, (_, task)) in lock(&self.tasks).drain() {
            debug!(kind = %kind, "Cancelling topology change");
            task.abort();
        }
    }

    // ===== Reconciliation =====

    /// Bring the hardware to the desired topology
    ///
    /// Must be called with the session lock held. With `rebuild` (or after a
    /// failed pass) everything attached is torn down and rebuilt; otherwise
    /// only the differences are applied.
    pub fn reconcile(
        &self,
        kind: TopologyKind,
        handle: &mut dyn CameraHandle,
        store: &ConfigurationStore,
        capabilities: &RwLock<Capabilities>,
        rebuild: bool,
    ) -> SessionResult<WriteOutcome> {
        let desired = self.desired();
        let committed = store.topology();
        let rebuild = rebuild || self.is_dirty();

        if !rebuild && desired == committed {
            debug!(kind = %kind, "Topology already matches request");
            return Ok(WriteOutcome::Unchanged);
        }

        self.status.send_replace(TopologyStatus::Reconfiguring(kind));
        self.dirty.store(true, Ordering::Release);

        let result = if rebuild {
            self.rebuild(handle, store, capabilities, &desired)
        } else {
            self.apply_diff(kind, handle, store, capabilities, &desired, &committed)
        };

        if result.is_ok() {
            self.dirty.store(false, Ordering::Release);
        }
        self.status.send_replace(TopologyStatus::Idle);
        result.map(|_| WriteOutcome::Applied)
    }

    fn apply_diff(
        &self,
        kind: TopologyKind,
        handle: &mut dyn CameraHandle,
        store: &ConfigurationStore,
        capabilities: &RwLock<Capabilities>,
        desired: &SessionTopologyState,
        committed: &SessionTopologyState,
    ) -> SessionResult<()> {
        let mut reselect_format = false;

        if desired.cam_selector != committed.cam_selector {
            info!(from = %committed.cam_selector, to = %desired.cam_selector, "Switching camera");
            let caps = read_capabilities(capabilities);
            appliers::reset_full(handle, store, &caps)?;
            handle.select_device(&desired.cam_selector)?;
            let caps = refresh_capabilities(handle, capabilities);
            // Baseline zoom is the new device's minimum
            appliers::apply_zoom(handle, store, &caps, caps.min_zoom, ApplyMode::Reconcile)?;
            store.cam_selector.write(desired.cam_selector.clone())?;
            reselect_format = true;
        }

        if desired.capture_mode != committed.capture_mode {
            info!(from = %committed.capture_mode, to = %desired.capture_mode, "Switching capture mode");
            let caps = read_capabilities(capabilities);
            appliers::reset_partial(handle, store, &caps)?;
            self.detach(handle, committed.capture_mode)?;
            self.attach(handle, desired.capture_mode)?;
            store.capture_mode.write(desired.capture_mode)?;
            reselect_format = true;
        }

        let format_changed = desired.cam_format != committed.cam_format;
        if reselect_format || format_changed {
            // Only an explicit format request must find a match
            let strict = kind == TopologyKind::CamFormat && format_changed;
            self.apply_best_format(handle, desired.capture_mode, &desired.cam_format, strict)?;
            store.cam_format.write(desired.cam_format.clone())?;
        }

        Ok(())
    }

    fn rebuild(
        &self,
        handle: &mut dyn CameraHandle,
        store: &ConfigurationStore,
        capabilities: &RwLock<Capabilities>,
        desired: &SessionTopologyState,
    ) -> SessionResult<()> {
        info!(
            mode = %desired.capture_mode,
            camera = %desired.cam_selector,
            format = %desired.cam_format,
            "Rebuilding session topology"
        );

        for mode in self.attached_outputs() {
            if let Err(e) = self.detach(handle, mode) {
                warn!(mode = %mode, error = %e, "Failed to detach output during rebuild");
            }
        }

        handle.select_device(&desired.cam_selector)?;
        let caps = refresh_capabilities(handle, capabilities);
        self.attach(handle, desired.capture_mode)?;

        store.cam_selector.write(desired.cam_selector.clone())?;
        store.capture_mode.write(desired.capture_mode)?;
        appliers::reset_full(handle, store, &caps)?;

        self.apply_best_format(handle, desired.capture_mode, &desired.cam_format, false)?;
        store.cam_format.write(desired.cam_format.clone())?;

        debug!(outputs = ?self.attached_outputs(), "Topology rebuilt");
        Ok(())
    }

    fn attach(&self, handle: &mut dyn CameraHandle, mode: CaptureMode) -> SessionResult<()> {
        handle.add_output(mode)?;
        lock(&self.attached).push(mode);
        Ok(())
    }

    fn detach(&self, handle: &mut dyn CameraHandle, mode: CaptureMode) -> SessionResult<()> {
        handle.remove_output(mode)?;
        lock(&self.attached).retain(|m| *m != mode);
        Ok(())
    }

    /// Pick and apply the best supported format for `mode`
    ///
    /// With `strict`, finding no format at all is an error; otherwise the
    /// platform default stays in place.
    fn apply_best_format(
        &self,
        handle: &mut dyn CameraHandle,
        mode: CaptureMode,
        request: &CamFormat,
        strict: bool,
    ) -> SessionResult<()> {
        let formats = handle.supported_formats(mode)?;

        let Some(best) = select_best(&formats, request.constraints()) else {
            if strict {
                return Err(SessionError::UnsupportedValue(format!(
                    "no {} formats available for {}",
                    mode, request
                )));
            }
            warn!(mode = %mode, "No capture formats reported, keeping platform default");
            *self.active_format.write().unwrap_or_else(PoisonError::into_inner) = None;
            return Ok(());
        };

        let frame_rate = derive_frame_rate(&best, request);
        let stabilization = derive_stabilization(&best, request);
        info!(
            format = %best,
            frame_rate = ?frame_rate,
            stabilization = ?stabilization,
            "Applying capture format"
        );
        handle.apply_format(&best, frame_rate, stabilization)?;

        *self.active_format.write().unwrap_or_else(PoisonError::into_inner) = Some(ActiveFormat {
            format: best,
            frame_rate,
            stabilization,
        });
        Ok(())
    }

    /// Detach everything this manager attached (best effort)
    pub fn teardown(&self, handle: &mut dyn CameraHandle) {
        for mode in self.attached_outputs() {
            if let Err(e) = self.detach(handle, mode) {
                warn!(mode = %mode, error = %e, "Failed to detach output on dispose");
            }
        }
    }
}

fn read_capabilities(capabilities: &RwLock<Capabilities>) -> Capabilities {
    capabilities
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn refresh_capabilities(
    handle: &dyn CameraHandle,
    capabilities: &RwLock<Capabilities>,
) -> Capabilities {
    let caps = capabilities_or_default(handle);
    *capabilities.write().unwrap_or_else(PoisonError::into_inner) = caps.clone();
    caps
}
