//! Typed source records with total defaults
//!
//! Field names match the capture JSON. Optional fields are `Option` with one
//! documented resolution each; geometry components default to the identity
//! transform so a partially filled record still yields a usable pose.

use serde::Deserialize;

fn one() -> f64 {
    1.0
}

/// One ego-motion sample. The ordered sequence of these defines the scene's
/// frame timeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEgoPose {
    #[serde(default)]
    pub timestamp_ns: Option<u64>,
    #[serde(default)]
    pub tx_m: f64,
    #[serde(default)]
    pub ty_m: f64,
    #[serde(default)]
    pub tz_m: f64,
    #[serde(default = "one")]
    pub qw: f64,
    #[serde(default)]
    pub qx: f64,
    #[serde(default)]
    pub qy: f64,
    #[serde(default)]
    pub qz: f64,
}

impl SourceEgoPose {
    pub fn translation(&self) -> [f64; 3] {
        [self.tx_m, self.ty_m, self.tz_m]
    }

    /// Quaternion in the source's `[qx, qy, qz, qw]` component order.
    pub fn rotation(&self) -> [f64; 4] {
        [self.qx, self.qy, self.qz, self.qw]
    }
}

/// Resolve the timeline: the source timestamp when present, the positional
/// index as a synthetic timestamp when absent.
pub fn frame_timestamps(poses: &[SourceEgoPose]) -> Vec<u64> {
    poses
        .iter()
        .enumerate()
        .map(|(i, pose)| pose.timestamp_ns.unwrap_or(i as u64))
        .collect()
}

/// One 3D bounding-box detection.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceAnnotation {
    #[serde(default)]
    pub track_uuid: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub timestamp_ns: Option<u64>,
    #[serde(default)]
    pub tx_m: f64,
    #[serde(default)]
    pub ty_m: f64,
    #[serde(default)]
    pub tz_m: f64,
    #[serde(default)]
    pub length_m: f64,
    #[serde(default)]
    pub width_m: f64,
    #[serde(default)]
    pub height_m: f64,
    #[serde(default = "one")]
    pub qw: f64,
    #[serde(default)]
    pub qx: f64,
    #[serde(default)]
    pub qy: f64,
    #[serde(default)]
    pub qz: f64,
    #[serde(default)]
    pub num_interior_pts: Option<u64>,
}

impl SourceAnnotation {
    pub fn translation(&self) -> [f64; 3] {
        [self.tx_m, self.ty_m, self.tz_m]
    }

    /// Box extents as `[length, width, height]`.
    pub fn size(&self) -> [f64; 3] {
        [self.length_m, self.width_m, self.height_m]
    }

    pub fn rotation(&self) -> [f64; 4] {
        [self.qx, self.qy, self.qz, self.qw]
    }

    pub fn lidar_points(&self) -> u64 {
        self.num_interior_pts.unwrap_or(0)
    }
}

/// Camera intrinsics row, keyed by sensor name.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceIntrinsics {
    pub sensor_name: String,
    #[serde(default)]
    pub fx_px: f64,
    #[serde(default)]
    pub fy_px: f64,
    #[serde(default)]
    pub cx_px: f64,
    #[serde(default)]
    pub cy_px: f64,
    #[serde(default)]
    pub k1: f64,
    #[serde(default)]
    pub k2: f64,
    #[serde(default)]
    pub k3: f64,
    #[serde(default)]
    pub width_px: u32,
    #[serde(default)]
    pub height_px: u32,
}

impl SourceIntrinsics {
    /// Row-major 3×3 pinhole matrix from (fx, fy, cx, cy).
    pub fn matrix(&self) -> Vec<[f64; 3]> {
        vec![
            [self.fx_px, 0.0, self.cx_px],
            [0.0, self.fy_px, self.cy_px],
            [0.0, 0.0, 1.0],
        ]
    }

    pub fn distortion(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.k3]
    }

    pub fn resolution(&self) -> Vec<u32> {
        vec![self.width_px, self.height_px]
    }
}

/// Sensor mount pose in the ego frame, keyed by sensor name.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceExtrinsics {
    pub sensor_name: String,
    #[serde(default)]
    pub tx_m: f64,
    #[serde(default)]
    pub ty_m: f64,
    #[serde(default)]
    pub tz_m: f64,
    #[serde(default = "one")]
    pub qw: f64,
    #[serde(default)]
    pub qx: f64,
    #[serde(default)]
    pub qy: f64,
    #[serde(default)]
    pub qz: f64,
}

impl SourceExtrinsics {
    pub fn translation(&self) -> [f64; 3] {
        [self.tx_m, self.ty_m, self.tz_m]
    }

    pub fn rotation(&self) -> [f64; 4] {
        [self.qx, self.qy, self.qz, self.qw]
    }
}
