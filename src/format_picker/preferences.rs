// SPDX-License-Identifier: GPL-3.0-only

//! Format selection and preference logic
//!
//! Every candidate gets a score:
//!
//! ```text
//! score(c) = Σ distance(c, constraint[i]) * 10^(N - i)  -  pixels(c) / 100000
//! ```
//!
//! Each constraint weighs ten times as much as the one after it, so list order
//! rather than raw distance decides precedence. The pixel bonus prefers larger
//! formats among otherwise equal ones. The lowest score wins; equal scores keep the earliest candidate.

use super::constraints::{CamFormat, FormatConstraint};
use crate::backends::camera::types::{CaptureFormat, StabilizationMode};
use tracing::debug;

/// Weight of the constraint at `index` in a list of `count` constraints
fn weight(index: usize, count: usize) -> f64 {
    10f64.powi((count - index) as i32)
}

/// Score a candidate against an ordered constraint list (lower is better)
pub fn score(format: &CaptureFormat, constraints: &[FormatConstraint]) -> f64 {
    let count = constraints.len();
    let penalty: f64 = constraints
        .iter()
        .enumerate()
        .map(|(i, constraint)| constraint.distance(format) * weight(i, count))
        .sum();
    let score = penalty - format.pixels() as f64 / 100_000.0;

    // 0x0 formats divide zero by zero; never let them win
    if score.is_nan() { f64::INFINITY } else { score }
}

/// Select the best format for the given constraints
///
/// Returns `None` only when `formats` is empty.
pub fn select_best(
    formats: &[CaptureFormat],
    constraints: &[FormatConstraint],
) -> Option<CaptureFormat> {
    let mut best: Option<(&CaptureFormat, f64)> = None;

    for format in formats {
        let candidate = score(format, constraints);
        match best {
            // Strict comparison keeps the first-seen format on ties
            Some((_, best_score)) if candidate >= best_score => {}
            _ => best = Some((format, candidate)),
        }
    }

    let (winner, winner_score) = best?;
    debug!(
        format = %winner,
        score = winner_score,
        candidates = formats.len(),
        "Selected capture format"
    );
    Some(winner.clone())
}

/// Frame rate to lock for the chosen format
///
/// The requested rate is clamped into the format's range; without a request
/// the format's maximum rate is used.
pub fn derive_frame_rate(format: &CaptureFormat, request: &CamFormat) -> Option<f64> {
    let (min, max) = format.fps_range()?;
    match request.frame_rate() {
        Some(fps) if min <= max => Some(fps.clamp(min, max)),
        _ => Some(max),
    }
}

/// Stabilization mode to enable for the chosen format
///
/// Unconstrained requests leave stabilization to the platform. An explicit
/// `Off` always stays off. Any other requested mode the format lacks falls
/// back to its first active mode, then to `Off`.
pub fn derive_stabilization(
    format: &CaptureFormat,
    request: &CamFormat,
) -> Option<StabilizationMode> {
    let wanted = request.stabilization()?;
    match wanted {
        Some(StabilizationMode::Off) => return Some(StabilizationMode::Off),
        Some(mode) if format.supports_stabilization(mode) => return Some(mode),
        _ => {}
    }
    Some(
        format
            .first_active_stabilization()
            .unwrap_or(StabilizationMode::Off),
    )
}
