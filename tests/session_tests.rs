// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the reconciliation engine

use camera_session::backends::camera::{
    CamSelector, CaptureMode, FlashMode, HardwareEvent, PlatformCall, SimulatedCamera,
    SimulatedOp, SimulatedProbe, StabilizationMode,
};
use camera_session::format_picker::FormatConstraint;
use camera_session::session::TopologyOutcome;
use camera_session::{
    CamFormat, ReconciliationEngine, SessionConfig, SessionError, SessionPhase, WriteOutcome,
};
use tokio::sync::mpsc;

async fn running_engine(config: SessionConfig) -> (ReconciliationEngine, SimulatedProbe) {
    let camera = SimulatedCamera::phone();
    let probe = camera.probe();
    let engine = ReconciliationEngine::new(camera, &config);
    engine.initialize().await.unwrap();
    engine.on_running().await.unwrap();
    probe.clear_calls();
    (engine, probe)
}

/// Device property calls only, without the lock/unlock around them
fn property_calls(probe: &SimulatedProbe) -> Vec<PlatformCall> {
    probe
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, PlatformCall::Lock | PlatformCall::Unlock))
        .filter(|call| !call.is_topology())
        .collect()
}

#[tokio::test]
async fn test_writing_current_value_is_silent() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let zoom_rx = engine.store().zoom.subscribe();

    assert_eq!(engine.set_zoom(1.0).unwrap(), WriteOutcome::Unchanged);
    assert_eq!(
        engine.set_flash(FlashMode::Off).unwrap(),
        WriteOutcome::Unchanged
    );
    assert_eq!(
        engine.set_capture_mode(CaptureMode::Photo).await.unwrap(),
        WriteOutcome::Unchanged
    );

    assert!(probe.calls().is_empty());
    assert!(!zoom_rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_requesting_current_topology_is_silent() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let format_rx = engine.store().cam_format.subscribe();
    let selector_rx = engine.store().cam_selector.subscribe();

    let format = engine.set_cam_format(CamFormat::default()).unwrap();
    assert_eq!(format.wait().await, TopologyOutcome::Unchanged);
    let selector = engine.set_cam_selector(CamSelector::Back).unwrap();
    assert_eq!(selector.wait().await, TopologyOutcome::Unchanged);

    assert!(probe.calls().is_empty());
    assert!(!format_rx.has_changed().unwrap());
    assert!(!selector_rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_photo_to_video_resets_exposure_and_flash() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    engine.set_zoom(3.0).unwrap();
    engine.set_exposure(1.5).unwrap();
    engine.set_flash(FlashMode::On).unwrap();

    let outcome = engine.set_capture_mode(CaptureMode::Video).await.unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(engine.capture_mode(), CaptureMode::Video);
    assert_eq!(engine.exposure(), 0.0);
    assert_eq!(engine.flash(), FlashMode::Off);
    assert_eq!(engine.zoom(), 3.0);
    assert_eq!(probe.state().outputs, vec![CaptureMode::Video]);
    assert_eq!(probe.state().flash, FlashMode::Off);
}

#[tokio::test]
async fn test_flash_outside_photo_mode_rejected() {
    let (engine, _probe) = running_engine(SessionConfig {
        capture_mode: CaptureMode::Video,
        ..SessionConfig::default()
    })
    .await;

    let err = engine.set_flash(FlashMode::Auto).unwrap_err();
    assert!(err.is_lifecycle());
    assert_eq!(engine.flash(), FlashMode::Off);
}

#[tokio::test]
async fn test_out_of_range_zoom_rejected() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let err = engine.set_zoom(25.0).unwrap_err();
    assert!(matches!(err, SessionError::UnsupportedValue(_)));
    assert!(probe.calls().is_empty());
}

#[tokio::test]
async fn test_quick_selector_switches_keep_only_the_last() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;

    let front = engine.set_cam_selector(CamSelector::Front).unwrap();
    let back = engine.set_cam_selector(CamSelector::Back).unwrap();

    assert_eq!(front.wait().await, TopologyOutcome::Cancelled);
    assert!(matches!(
        back.wait().await,
        TopologyOutcome::Committed | TopologyOutcome::Unchanged
    ));
    assert_eq!(engine.cam_selector(), CamSelector::Back);
    assert_eq!(probe.state().active_device, Some(CamSelector::Back));
    assert!(
        !probe
            .calls()
            .contains(&PlatformCall::SelectDevice(CamSelector::Front))
    );
}

#[tokio::test]
async fn test_selector_switch_resets_device_properties() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    engine.set_zoom(3.0).unwrap();
    engine.set_torch(true).unwrap();

    let task = engine.set_cam_selector(CamSelector::Front).unwrap();
    assert_eq!(task.wait().await, TopologyOutcome::Committed);

    assert_eq!(engine.cam_selector(), CamSelector::Front);
    assert_eq!(engine.zoom(), 1.0);
    assert!(!engine.torch());
    assert!(!probe.state().torch);
    assert!(!engine.capabilities().flash_supported);
    assert_eq!(probe.state().format.map(|f| f.width), Some(3264));
}

#[tokio::test]
async fn test_format_change_applies_derived_fields() {
    let (engine, probe) = running_engine(SessionConfig {
        capture_mode: CaptureMode::Video,
        ..SessionConfig::default()
    })
    .await;

    let request = CamFormat::new(vec![
        FormatConstraint::frame_rate(120.0),
        FormatConstraint::stabilization(None),
    ]);
    let task = engine.set_cam_format(request.clone()).unwrap();
    assert_eq!(task.wait().await, TopologyOutcome::Committed);

    let state = probe.state();
    assert_eq!(state.format.map(|f| f.width), Some(1280));
    assert_eq!(state.frame_rate, Some(120.0));
    assert_eq!(state.stabilization, Some(StabilizationMode::Off));
    assert_eq!(engine.cam_format(), request);
}

#[tokio::test]
async fn test_format_failure_reported_on_error_channel() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let mut errors = engine.subscribe_errors();
    probe.fail(SimulatedOp::ApplyFormat);

    let request = CamFormat::new(vec![FormatConstraint::resolution(1920, 1080)]);
    let task = engine.set_cam_format(request).unwrap();

    match task.wait().await {
        TopologyOutcome::Failed(e) => assert!(e.is_platform()),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(errors.try_recv().unwrap().is_platform());
    assert!(engine.cam_format().is_unconstrained());

    // The next request starts from a clean rebuild
    probe.recover(SimulatedOp::ApplyFormat);
    let request = CamFormat::new(vec![FormatConstraint::resolution(1920, 1080)]);
    let task = engine.set_cam_format(request.clone()).unwrap();
    assert_eq!(task.wait().await, TopologyOutcome::Committed);
    assert_eq!(probe.state().outputs, vec![CaptureMode::Photo]);
    assert_eq!(engine.cam_format(), request);
    assert!(probe.state().format.is_some());
}

#[tokio::test]
async fn test_buffered_writes_replay_in_fixed_order() {
    let camera = SimulatedCamera::phone();
    let probe = camera.probe();
    let engine = ReconciliationEngine::new(camera, &SessionConfig::default());

    assert_eq!(
        engine.set_flash(FlashMode::On).unwrap(),
        WriteOutcome::Deferred
    );
    engine.set_torch(true).unwrap();
    engine.set_exposure(1.0).unwrap();
    engine.set_zoom(2.0).unwrap();

    engine.initialize().await.unwrap();
    assert!(!probe.calls().contains(&PlatformCall::SetZoom(2.0)));
    probe.clear_calls();

    engine.on_running().await.unwrap();
    assert_eq!(
        property_calls(&probe),
        vec![
            PlatformCall::SetZoom(2.0),
            PlatformCall::SetExposure(1.0),
            PlatformCall::SetTorch(true),
            PlatformCall::SetFlash(FlashMode::On),
        ]
    );
}

#[tokio::test]
async fn test_configured_values_reach_hardware_on_running() {
    let config = SessionConfig {
        zoom: Some(4.0),
        exposure: -1.0,
        ..SessionConfig::default()
    };
    let (engine, probe) = running_engine(config).await;
    assert_eq!(engine.zoom(), 4.0);
    assert_eq!(engine.exposure(), -1.0);
    assert_eq!(probe.state().zoom, Some(4.0));
}

#[tokio::test]
async fn test_replay_failure_reported_without_blocking_others() {
    let camera = SimulatedCamera::phone();
    let engine = ReconciliationEngine::new(
        camera,
        &SessionConfig {
            cam_selector: CamSelector::Front,
            ..SessionConfig::default()
        },
    );
    let mut errors = engine.subscribe_errors();

    engine.set_torch(true).unwrap();
    engine.set_zoom(2.0).unwrap();
    engine.initialize().await.unwrap();
    engine.on_running().await.unwrap();

    assert!(matches!(
        errors.try_recv().unwrap(),
        SessionError::UnsupportedValue(_)
    ));
    assert_eq!(engine.zoom(), 2.0);
    assert!(!engine.torch());
}

#[tokio::test]
async fn test_topology_requested_before_running_applies_on_initialize() {
    let camera = SimulatedCamera::phone();
    let probe = camera.probe();
    let engine = ReconciliationEngine::new(camera, &SessionConfig::default());

    assert_eq!(
        engine.set_capture_mode(CaptureMode::Video).await.unwrap(),
        WriteOutcome::Deferred
    );
    let task = engine.set_cam_selector(CamSelector::Front).unwrap();
    assert_eq!(task.wait().await, TopologyOutcome::Deferred);
    assert!(probe.calls().is_empty());

    engine.initialize().await.unwrap();
    assert_eq!(probe.state().active_device, Some(CamSelector::Front));
    assert_eq!(probe.state().outputs, vec![CaptureMode::Video]);
}

#[tokio::test]
async fn test_resume_reapplies_zoom_and_exposure() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    engine.set_zoom(2.0).unwrap();
    engine.set_exposure(0.5).unwrap();

    engine.on_paused().unwrap();
    assert_eq!(engine.set_zoom(2.0).unwrap(), WriteOutcome::Deferred);
    probe.clear_calls();

    engine.on_resumed().await.unwrap();
    assert_eq!(
        property_calls(&probe),
        vec![PlatformCall::SetZoom(2.0), PlatformCall::SetExposure(0.5)]
    );
    assert_eq!(engine.phase(), SessionPhase::Running);
}

#[tokio::test]
async fn test_hardware_events_commit_without_platform_calls() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let (tx, rx) = mpsc::channel(4);
    let listener = engine.spawn_hardware_listener(rx);

    tx.send(HardwareEvent::ZoomChanged(4.0)).await.unwrap();
    tx.send(HardwareEvent::TorchChanged(true)).await.unwrap();
    drop(tx);
    listener.await.unwrap();

    assert_eq!(engine.zoom(), 4.0);
    assert!(engine.torch());
    assert!(probe.calls().is_empty());
}

#[tokio::test]
async fn test_disposed_writes_fail() {
    let (engine, probe) = running_engine(SessionConfig::default()).await;
    let mut phase = engine.subscribe_phase();
    engine.dispose().unwrap();

    assert!(phase.has_changed().unwrap());
    assert_eq!(*phase.borrow_and_update(), SessionPhase::Disposed);
    assert!(probe.state().outputs.is_empty());

    assert!(engine.set_zoom(2.0).unwrap_err().is_lifecycle());
    assert!(engine.set_exposure(1.0).unwrap_err().is_lifecycle());
    assert!(engine.set_torch(true).unwrap_err().is_lifecycle());
    assert!(engine.set_flash(FlashMode::On).unwrap_err().is_lifecycle());
    assert!(
        engine
            .set_capture_mode(CaptureMode::Video)
            .await
            .unwrap_err()
            .is_lifecycle()
    );
    assert!(
        engine
            .set_cam_selector(CamSelector::Front)
            .unwrap_err()
            .is_lifecycle()
    );
    assert!(
        engine
            .set_cam_format(CamFormat::default())
            .unwrap_err()
            .is_lifecycle()
    );
    assert!(
        engine
            .handle_hardware_event(HardwareEvent::ZoomChanged(2.0))
            .unwrap_err()
            .is_lifecycle()
    );
}
