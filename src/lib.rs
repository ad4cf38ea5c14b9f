// SPDX-License-Identifier: MPL-2.0

//! Camera Session - declarative configuration for stateful camera sessions
//!
//! This library reconciles a declarative configuration (capture mode, camera,
//! capture format, zoom, exposure, flash, torch) onto an imperative platform
//! camera session, issuing only the platform calls needed to converge.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Platform camera handle abstraction and a simulated handle
//! - [`format_picker`]: Prioritized best-format selection
//! - [`session`]: Committed configuration, buffering, topology and the engine
//! - [`config`]: Initial session configuration
//!
//! # Example
//!
//! ```no_run
//! use camera_session::backends::camera::{CaptureMode, SimulatedCamera};
//! use camera_session::{ReconciliationEngine, SessionConfig};
//!
//! # async fn run() -> camera_session::SessionResult<()> {
//! let engine = ReconciliationEngine::new(SimulatedCamera::phone(), &SessionConfig::default());
//! engine.initialize().await?;
//! engine.on_running().await?;
//! engine.set_zoom(2.0)?;
//! engine.set_capture_mode(CaptureMode::Video).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod format_picker;
pub mod session;

// Re-export commonly used types
pub use config::SessionConfig;
pub use errors::{SessionError, SessionResult, WriteOutcome};
pub use format_picker::{CamFormat, FormatConstraint};
pub use session::{ReconciliationEngine, SessionPhase, TopologyOutcome};
