// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera sessions
//!
//! Platform adapters live behind the [`camera::CameraHandle`] trait so that the
//! reconciliation logic above it stays platform independent:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Session Layer                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │ CameraHandle     │  │ SimulatedCamera │  │
//! │  │ (trait)          │  │ (in-memory)     │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera handle trait, shared types and the simulated adapter

pub mod camera;
