// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera session operations
//!
//! This module provides command-line functionality for:
//! - Listing the formats of the simulated cameras
//! - Running the format selector on a list of formats
//! - Driving a scripted session against the simulated camera

use camera_session::backends::camera::{
    CamSelector, CameraHandle, CaptureFormat, CaptureMode, SimulatedCamera,
};
use camera_session::config::SessionConfig;
use camera_session::format_picker::{
    CamFormat, FormatConstraint, derive_frame_rate, derive_stabilization, select_best,
};
use camera_session::session::{ReconciliationEngine, TopologyOutcome};
use std::path::{Path, PathBuf};

/// List every format the simulated phone offers, per camera and capture mode
pub fn list_formats() -> Result<(), Box<dyn std::error::Error>> {
    let mut camera = SimulatedCamera::phone();

    for selector in [CamSelector::Back, CamSelector::Front] {
        camera.select_device(&selector)?;
        let caps = camera.capabilities()?;
        println!(
            "[{}] zoom {}..{}, exposure {}..{} EV, flash: {}, torch: {}",
            selector,
            caps.min_zoom,
            caps.max_zoom,
            caps.min_exposure,
            caps.max_exposure,
            yes_no(caps.flash_supported),
            yes_no(caps.torch_supported)
        );

        for mode in CaptureMode::ALL {
            let formats = camera.supported_formats(mode)?;
            if formats.is_empty() {
                continue;
            }
            println!("  {}:", mode);
            for format in &formats {
                println!("    {}", format);
            }
        }
        println!();
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Pick the best format from a JSON list under the given constraints
///
/// `formats` is either a path to a JSON file or the JSON text itself.
pub fn select_format(
    formats: &str,
    constraints: Vec<FormatConstraint>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = if Path::new(formats).is_file() {
        std::fs::read_to_string(formats)?
    } else {
        formats.to_string()
    };
    let candidates: Vec<CaptureFormat> = serde_json::from_str(&json)?;
    let request = CamFormat::new(constraints);

    println!("Candidates: {}", candidates.len());
    println!("Constraints: {}", request);

    match select_best(&candidates, request.constraints()) {
        Some(best) => {
            println!("Selected: {}", best);
            if let Some(fps) = derive_frame_rate(&best, &request) {
                println!("  frame rate: {}", fps);
            }
            if let Some(mode) = derive_stabilization(&best, &request) {
                println!("  stabilization: {}", mode);
            }
        }
        None => println!("No format"),
    }

    Ok(())
}

/// Run a scripted session on the simulated phone and print every platform call
pub fn simulate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => SessionConfig::load(&path)?,
        None => SessionConfig::load_or_default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_script(config))
}

async fn run_script(config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let camera = SimulatedCamera::phone();
    let probe = camera.probe();
    let engine = ReconciliationEngine::new(camera, &config);
    let mut errors = engine.subscribe_errors();

    println!("Buffering zoom 2.0 before the session runs");
    engine.set_zoom(2.0)?;

    step("initialize", engine.initialize().await);
    step("running", engine.on_running().await);
    step("torch on", engine.set_torch(true).map(|_| ()));
    step(
        "capture mode video",
        engine.set_capture_mode(CaptureMode::Video).await.map(|_| ()),
    );

    let format = CamFormat::new(vec![
        FormatConstraint::frame_rate(60.0),
        FormatConstraint::stabilization(None),
    ]);
    let task = engine.set_cam_format(format)?;
    print_outcome("format fps=60", task.wait().await);

    // Only the last of two quick switches survives
    let front = engine.set_cam_selector(CamSelector::Front)?;
    let back = engine.set_cam_selector(CamSelector::Back)?;
    print_outcome("camera front", front.wait().await);
    print_outcome("camera back", back.wait().await);

    step("pause", engine.on_paused());
    step("resume", engine.on_resumed().await);

    if let Some(active) = engine.active_format() {
        println!(
            "Active format: {} (fps {:?}, stabilization {:?})",
            active.format, active.frame_rate, active.stabilization
        );
    }

    step("dispose", engine.dispose());

    while let Ok(err) = errors.try_recv() {
        println!("Reported error: {}", err);
    }

    println!();
    println!("Platform calls:");
    for (index, call) in probe.calls().iter().enumerate() {
        println!("  {:>3}  {}", index, call);
    }

    Ok(())
}

fn step(name: &str, result: camera_session::errors::SessionResult<()>) {
    match result {
        Ok(()) => println!("{}: ok", name),
        Err(e) => println!("{}: {}", name, e),
    }
}

fn print_outcome(name: &str, outcome: TopologyOutcome) {
    match outcome {
        TopologyOutcome::Failed(e) => println!("{}: failed: {}", name, e),
        other => println!("{}: {:?}", name, other),
    }
}
