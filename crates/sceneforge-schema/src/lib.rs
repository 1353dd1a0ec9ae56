//! Target-schema record types
//!
//! One struct per output table. All records are flat serde values; the only
//! fields written after construction are the `prev`/`next` links (filled by
//! the chain linker) and the instance summaries (filled by the track
//! aggregator). Everything else is frozen at generation time.
//!
//! Link fields hold the referenced record's token, or the empty string at
//! either end of a chain. Records are stored in flat arrays for bulk
//! serialization; `prev`/`next` impose the logical traversal order on top.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor stream kind. Drives whether a calibrated sensor carries an
/// intrinsic matrix and which file extension sample data points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Camera,
    Lidar,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Camera => write!(f, "camera"),
            Modality::Lidar => write!(f, "lidar"),
        }
    }
}

// ============================================================================
// Static lookup tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub token: String,
    pub channel: String,
    pub modality: Modality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub token: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub token: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub token: String,
    pub level: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub token: String,
    pub category: String,
    pub filename: String,
    pub log_tokens: Vec<String>,
}

// ============================================================================
// Calibration
// ============================================================================

/// Per-scene calibration row for one sensor.
///
/// `camera_intrinsic` is a 3×3 row-major matrix for cameras and empty for
/// lidar; `distortion`/`resolution` likewise come from camera intrinsics
/// only. Quaternions keep the source's component order untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedSensorRecord {
    pub token: String,
    pub sensor_token: String,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
    pub camera_intrinsic: Vec<[f64; 3]>,
    pub distortion: Vec<f64>,
    pub resolution: Vec<u32>,
}

// ============================================================================
// Scene hierarchy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub token: String,
    pub logfile: String,
    pub vehicle: String,
    pub location: String,
    pub date_captured: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub token: String,
    pub log_token: String,
    pub nbr_samples: usize,
    pub first_sample_token: String,
    pub last_sample_token: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub token: String,
    pub timestamp: u64,
    pub prev: String,
    pub next: String,
    pub scene_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDataRecord {
    pub token: String,
    pub sample_token: String,
    pub ego_pose_token: String,
    pub calibrated_sensor_token: String,
    pub filename: String,
    pub fileformat: String,
    pub timestamp: u64,
    pub is_key_frame: bool,
    pub height: u32,
    pub width: u32,
    pub prev: String,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgoPoseRecord {
    pub token: String,
    pub timestamp: u64,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

// ============================================================================
// Tracks and detections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub token: String,
    pub category_token: String,
    pub nbr_annotations: usize,
    pub first_annotation_token: String,
    pub last_annotation_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAnnotationRecord {
    pub token: String,
    pub sample_token: String,
    pub instance_token: String,
    pub category_token: String,
    pub visibility_token: String,
    pub attribute_tokens: Vec<String>,
    pub translation: [f64; 3],
    pub size: [f64; 3],
    pub rotation: [f64; 4],
    pub prev: String,
    pub next: String,
    pub num_lidar_pts: u64,
    pub num_radar_pts: u64,
}

// ============================================================================
// Chain access
// ============================================================================

/// Records that participate in a prev/next chain.
///
/// The linker only ever reads tokens and writes link fields through this
/// trait, so one linking pass serves samples, per-channel sample data, and
/// per-track annotation sequences alike.
pub trait Chainable {
    fn token(&self) -> &str;
    fn prev(&self) -> &str;
    fn next(&self) -> &str;
    fn set_prev(&mut self, token: String);
    fn set_next(&mut self, token: String);
}

macro_rules! impl_chainable {
    ($ty:ty) => {
        impl Chainable for $ty {
            fn token(&self) -> &str {
                &self.token
            }
            fn prev(&self) -> &str {
                &self.prev
            }
            fn next(&self) -> &str {
                &self.next
            }
            fn set_prev(&mut self, token: String) {
                self.prev = token;
            }
            fn set_next(&mut self, token: String) {
                self.next = token;
            }
        }
    };
}

impl_chainable!(SampleRecord);
impl_chainable!(SampleDataRecord);
impl_chainable!(SampleAnnotationRecord);
