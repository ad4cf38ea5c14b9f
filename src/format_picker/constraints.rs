// SPDX-License-Identifier: GPL-3.0-only

//! Capture format constraints
//!
//! A [`CamFormat`] is an ordered list of [`FormatConstraint`]s. Position
//! encodes priority: the first constraint matters most.

use crate::backends::camera::types::{CaptureFormat, StabilizationMode};
use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One requirement on the capture format
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatConstraint {
    /// Desired width / height ratio (e.g. 16/9)
    AspectRatio { ratio: f64 },
    /// Desired resolution in pixels
    Resolution { width: u32, height: u32 },
    /// Desired frame rate
    FrameRate { fps: f64 },
    /// Desired stabilization mode, or any active mode when `None`
    Stabilization { mode: Option<StabilizationMode> },
}

impl FormatConstraint {
    pub fn aspect_ratio(ratio: f64) -> Self {
        FormatConstraint::AspectRatio { ratio }
    }

    pub fn resolution(width: u32, height: u32) -> Self {
        FormatConstraint::Resolution { width, height }
    }

    pub fn frame_rate(fps: f64) -> Self {
        FormatConstraint::FrameRate { fps }
    }

    pub fn stabilization(mode: Option<StabilizationMode>) -> Self {
        FormatConstraint::Stabilization { mode }
    }

    /// How far `format` is from satisfying this constraint (0 = satisfied)
    pub fn distance(&self, format: &CaptureFormat) -> f64 {
        match *self {
            FormatConstraint::AspectRatio { ratio } => (format.aspect_ratio() - ratio).abs(),
            FormatConstraint::Resolution { width, height } => {
                let dw = (format.width as f64 - width as f64).abs();
                let dh = (format.height as f64 - height as f64).abs();
                (dw + dh) / 1000.0
            }
            FormatConstraint::FrameRate { fps } => match format.fps_range() {
                Some((min, _)) if fps < min => min - fps,
                Some((_, max)) if fps > max => fps - max,
                Some(_) => 0.0,
                // No rate information: treat as a 0..0 range
                None => fps.abs(),
            },
            FormatConstraint::Stabilization { mode: Some(mode) } => {
                if format.supports_stabilization(mode) {
                    0.0
                } else if format.first_active_stabilization().is_some() {
                    0.5
                } else {
                    1.0
                }
            }
            FormatConstraint::Stabilization { mode: None } => {
                if format.first_active_stabilization().is_some() {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

impl std::fmt::Display for FormatConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatConstraint::AspectRatio { ratio } => write!(f, "aspect={}", ratio),
            FormatConstraint::Resolution { width, height } => {
                write!(f, "resolution={}x{}", width, height)
            }
            FormatConstraint::FrameRate { fps } => write!(f, "fps={}", fps),
            FormatConstraint::Stabilization { mode: Some(mode) } => {
                write!(f, "stabilization={}", mode)
            }
            FormatConstraint::Stabilization { mode: None } => write!(f, "stabilization=any"),
        }
    }
}

/// Parse the compact `key=value` form used on the command line
///
/// Accepted keys: `aspect` (`16:9` or `1.777`), `resolution` (`1920x1080`),
/// `fps`, `stabilization` (mode name or `any`).
impl FromStr for FormatConstraint {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SessionError::Config(format!("invalid format constraint '{}'", s));
        let (key, value) = s.split_once('=').ok_or_else(invalid)?;
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "aspect" | "aspect_ratio" => {
                let ratio = match value.split_once(':') {
                    Some((w, h)) => {
                        let w: f64 = w.trim().parse().map_err(|_| invalid())?;
                        let h: f64 = h.trim().parse().map_err(|_| invalid())?;
                        if h == 0.0 {
                            return Err(invalid());
                        }
                        w / h
                    }
                    None => value.parse().map_err(|_| invalid())?,
                };
                Ok(FormatConstraint::aspect_ratio(ratio))
            }
            "resolution" | "res" => {
                let (w, h) = value.split_once('x').ok_or_else(invalid)?;
                let width = w.trim().parse().map_err(|_| invalid())?;
                let height = h.trim().parse().map_err(|_| invalid())?;
                Ok(FormatConstraint::resolution(width, height))
            }
            "fps" | "framerate" | "frame_rate" => {
                let fps = value.parse().map_err(|_| invalid())?;
                Ok(FormatConstraint::frame_rate(fps))
            }
            "stabilization" => {
                if value.eq_ignore_ascii_case("any") {
                    return Ok(FormatConstraint::stabilization(None));
                }
                let mode = StabilizationMode::from_name(value).ok_or_else(invalid)?;
                Ok(FormatConstraint::stabilization(Some(mode)))
            }
            _ => Err(invalid()),
        }
    }
}

/// Requested capture format as an ordered list of constraints
///
/// An empty list means "whatever the platform picks".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CamFormat {
    constraints: Vec<FormatConstraint>,
}

impl CamFormat {
    pub fn new(constraints: Vec<FormatConstraint>) -> Self {
        Self { constraints }
    }

    /// Constraints in priority order, most important first
    pub fn constraints(&self) -> &[FormatConstraint] {
        &self.constraints
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Desired frame rate, from the highest-priority frame rate constraint
    pub fn frame_rate(&self) -> Option<f64> {
        self.constraints.iter().find_map(|c| match c {
            FormatConstraint::FrameRate { fps } => Some(*fps),
            _ => None,
        })
    }

    /// Desired stabilization, from the highest-priority stabilization constraint
    ///
    /// The outer `Option` is `None` when stabilization is not constrained at all.
    pub fn stabilization(&self) -> Option<Option<StabilizationMode>> {
        self.constraints.iter().find_map(|c| match c {
            FormatConstraint::Stabilization { mode } => Some(*mode),
            _ => None,
        })
    }
}

impl PartialEq for CamFormat {
    fn eq(&self, other: &Self) -> bool {
        self.constraints == other.constraints
    }
}

impl From<Vec<FormatConstraint>> for CamFormat {
    fn from(constraints: Vec<FormatConstraint>) -> Self {
        Self::new(constraints)
    }
}

impl std::fmt::Display for CamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.constraints.is_empty() {
            return write!(f, "unconstrained");
        }
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_distance_uses_nearer_bound() {
        let format = CaptureFormat::new(1920, 1080)
            .with_fps_range(15.0, 30.0)
            .unwrap();
        assert_eq!(FormatConstraint::frame_rate(24.0).distance(&format), 0.0);
        assert_eq!(FormatConstraint::frame_rate(60.0).distance(&format), 30.0);
        assert_eq!(FormatConstraint::frame_rate(10.0).distance(&format), 5.0);
    }

    #[test]
    fn test_resolution_distance_is_scaled() {
        let format = CaptureFormat::new(1280, 720);
        let distance = FormatConstraint::resolution(1920, 1080).distance(&format);
        assert!((distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stabilization_distance_tiers() {
        let none = CaptureFormat::new(1920, 1080).with_stabilization([StabilizationMode::Off]);
        let standard = CaptureFormat::new(1920, 1080)
            .with_stabilization([StabilizationMode::Off, StabilizationMode::Standard]);
        let unreported = CaptureFormat::new(1920, 1080);

        let cinematic = FormatConstraint::stabilization(Some(StabilizationMode::Cinematic));
        assert_eq!(cinematic.distance(&none), 1.0);
        assert_eq!(cinematic.distance(&standard), 0.5);
        assert_eq!(cinematic.distance(&unreported), 1.0);

        let standard_wanted = FormatConstraint::stabilization(Some(StabilizationMode::Standard));
        assert_eq!(standard_wanted.distance(&standard), 0.0);

        let any = FormatConstraint::stabilization(None);
        assert_eq!(any.distance(&standard), 0.0);
        assert_eq!(any.distance(&none), 1.0);
    }

    #[test]
    fn test_parse_constraints() {
        let aspect: FormatConstraint = "aspect=16:9".parse().unwrap();
        assert_eq!(aspect, FormatConstraint::aspect_ratio(16.0 / 9.0));
        assert_eq!(
            "resolution=1920x1080".parse::<FormatConstraint>().unwrap(),
            FormatConstraint::resolution(1920, 1080)
        );
        assert_eq!(
            "fps=60".parse::<FormatConstraint>().unwrap(),
            FormatConstraint::frame_rate(60.0)
        );
        assert_eq!(
            "stabilization=any".parse::<FormatConstraint>().unwrap(),
            FormatConstraint::stabilization(None)
        );
        assert!("fps".parse::<FormatConstraint>().is_err());
        assert!("aspect=4:0".parse::<FormatConstraint>().is_err());
        assert!("zoom=2".parse::<FormatConstraint>().is_err());
    }

    #[test]
    fn test_cam_format_derived_requests() {
        let format = CamFormat::new(vec![
            FormatConstraint::resolution(1920, 1080),
            FormatConstraint::frame_rate(60.0),
            FormatConstraint::frame_rate(30.0),
        ]);
        assert_eq!(format.frame_rate(), Some(60.0));
        assert_eq!(format.stabilization(), None);
        assert!(CamFormat::default().is_unconstrained());
    }
}
