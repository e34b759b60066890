//! Track geometry: maps a pointer's clientX onto a clamped progress percentage.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GeometryError {
    /// The handle is at least as wide as the track, so there is nothing to travel.
    #[error("degenerate track: width {track_width} leaves no travel for handle {handle_width}")]
    DegenerateTrack { track_width: f64, handle_width: f64 },
}

/// Bounding box of the track, captured when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackGeometry {
    pub origin_x: f64,
    pub width: f64,
    pub handle_width: f64,
}

impl TrackGeometry {
    pub fn new(origin_x: f64, width: f64, handle_width: f64) -> Self {
        Self {
            origin_x,
            width,
            handle_width,
        }
    }

    pub fn travel(&self) -> f64 {
        self.width - self.handle_width
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.travel() > 0.0)
    }

    pub fn progress_at(&self, client_x: f64) -> Result<f64, GeometryError> {
        compute_progress(client_x, self.origin_x, self.width, self.handle_width)
    }
}

/// Progress in `[0, 100]` for a handle centred on `client_x`.
pub fn compute_progress(
    client_x: f64,
    track_left: f64,
    track_width: f64,
    handle_width: f64,
) -> Result<f64, GeometryError> {
    let travel = track_width - handle_width;
    // also rejects NaN widths
    if !(travel > 0.0) {
        return Err(GeometryError::DegenerateTrack {
            track_width,
            handle_width,
        });
    }
    let raw = client_x - track_left - handle_width / 2.0;
    let clamped = raw.clamp(0.0, travel);
    Ok(clamped / travel * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_track() -> TrackGeometry {
        TrackGeometry::new(10.0, 300.0, 60.0)
    }

    #[test]
    fn raw_offset_is_measured_from_handle_centre() {
        let t = scenario_track();
        // raw offset 220 => 220 / 240
        let p = t.progress_at(10.0 + 30.0 + 220.0).unwrap();
        assert!((p - 91.666_666).abs() < 1e-3, "got {p}");
        let p = t.progress_at(10.0 + 30.0 + 100.0).unwrap();
        assert!((p - 41.666_666).abs() < 1e-3, "got {p}");
    }

    #[test]
    fn output_is_clamped_to_percent_range() {
        let t = scenario_track();
        for x in [-1.0e9, -50.0, 0.0, 39.9, 40.0, 150.0, 280.0, 281.0, 1.0e9] {
            let p = t.progress_at(x).unwrap();
            assert!((0.0..=100.0).contains(&p), "x={x} gave {p}");
        }
        assert_eq!(t.progress_at(-1.0e9).unwrap(), 0.0);
        assert_eq!(t.progress_at(1.0e9).unwrap(), 100.0);
    }

    #[test]
    fn monotonic_in_client_x() {
        let t = scenario_track();
        let mut last = -1.0;
        let mut x = -100.0;
        while x < 500.0 {
            let p = t.progress_at(x).unwrap();
            assert!(p >= last, "progress fell from {last} to {p} at x={x}");
            last = p;
            x += 0.75;
        }
    }

    #[test]
    fn same_sample_same_progress() {
        let t = scenario_track();
        assert_eq!(t.progress_at(123.4).unwrap(), t.progress_at(123.4).unwrap());
    }

    #[test]
    fn handle_as_wide_as_track_is_degenerate() {
        assert!(matches!(
            compute_progress(100.0, 0.0, 60.0, 60.0),
            Err(GeometryError::DegenerateTrack { .. })
        ));
        assert!(compute_progress(100.0, 0.0, 40.0, 60.0).is_err());
        assert!(compute_progress(100.0, 0.0, f64::NAN, 60.0).is_err());
        assert!(TrackGeometry::new(0.0, 50.0, 60.0).is_degenerate());
    }
}
