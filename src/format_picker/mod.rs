// SPDX-License-Identifier: GPL-3.0-only

//! Format picker module
//!
//! This module handles capture format selection:
//! - Constraint types describing what the caller wants
//! - Weighted scoring that picks the best supported format

pub mod constraints;
pub mod preferences;

pub use constraints::{CamFormat, FormatConstraint};
pub use preferences::{derive_frame_rate, derive_stabilization, score, select_best};
