//! Source-side record types and per-scene loading
//!
//! The source captures arrive as loosely typed JSON with optional fields.
//! This crate is the untrusted boundary: every document deserializes into an
//! explicit struct where each optional absence has exactly one documented
//! default, so nothing null-ish propagates downstream.
//!
//! Loading policy (one scene at a time):
//! - the ego-pose document defines the scene's frame timeline and is
//!   required; if it is missing or malformed the whole scene is skipped
//! - annotations, intrinsics, and extrinsics are optional documents; a
//!   missing or malformed one drops only the generation steps that depend
//!   on it, and the drop is recorded for the scene report

pub mod records;

pub use records::{
    frame_timestamps, SourceAnnotation, SourceEgoPose, SourceExtrinsics, SourceIntrinsics,
};

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Source file names inside a scene directory, as produced by the capture
/// preprocessing step.
pub const EGO_POSE_FILE: &str = "new_egopose_vehicle.json";
pub const ANNOTATIONS_FILE: &str = "new_annotations.json";
pub const INTRINSICS_FILE: &str = "calibration/intrinsics.json";
pub const EXTRINSICS_FILE: &str = "calibration/egovehicle_SE3_sensor.json";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("missing source file {path}")]
    MissingFile { path: PathBuf },

    #[error("malformed source document {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An optional document that failed to load. The scene still converts; the
/// dependent generation steps are simply omitted.
#[derive(Debug)]
pub struct DroppedDocument {
    pub file: &'static str,
    pub error: SourceError,
}

/// Everything one scene needs, fully typed.
#[derive(Debug)]
pub struct SceneSource {
    pub scene: u32,
    pub dir: PathBuf,
    pub ego_poses: Vec<SourceEgoPose>,
    /// `None` when the annotation document was missing or malformed;
    /// instance and sample_annotation generation is skipped entirely.
    pub annotations: Option<Vec<SourceAnnotation>>,
    pub intrinsics: Vec<SourceIntrinsics>,
    pub extrinsics: Vec<SourceExtrinsics>,
    pub dropped: Vec<DroppedDocument>,
}

impl SceneSource {
    pub fn num_frames(&self) -> usize {
        self.ego_poses.len()
    }
}

/// Load one scene directory.
///
/// Errors only when the required ego-pose document cannot be loaded; the
/// caller treats that as "skip this scene and continue".
pub fn load_scene(dir: &Path, scene: u32) -> Result<SceneSource, SourceError> {
    let ego_poses: Vec<SourceEgoPose> = read_json(&dir.join(EGO_POSE_FILE))?;

    let mut dropped = Vec::new();
    let annotations = match read_json::<Vec<SourceAnnotation>>(&dir.join(ANNOTATIONS_FILE)) {
        Ok(anns) => Some(anns),
        Err(error) => {
            warn!(scene, %error, "annotation document unavailable, skipping annotation tables");
            dropped.push(DroppedDocument {
                file: ANNOTATIONS_FILE,
                error,
            });
            None
        }
    };
    let intrinsics = match read_json::<Vec<SourceIntrinsics>>(&dir.join(INTRINSICS_FILE)) {
        Ok(rows) => rows,
        Err(error) => {
            warn!(scene, %error, "intrinsics unavailable, cameras will carry no intrinsic matrix");
            dropped.push(DroppedDocument {
                file: INTRINSICS_FILE,
                error,
            });
            Vec::new()
        }
    };
    let extrinsics = match read_json::<Vec<SourceExtrinsics>>(&dir.join(EXTRINSICS_FILE)) {
        Ok(rows) => rows,
        Err(error) => {
            warn!(scene, %error, "extrinsics unavailable, sensor mounts default to identity");
            dropped.push(DroppedDocument {
                file: EXTRINSICS_FILE,
                error,
            });
            Vec::new()
        }
    };

    Ok(SceneSource {
        scene,
        dir: dir.to_path_buf(),
        ego_poses,
        annotations,
        intrinsics,
        extrinsics,
        dropped,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SourceError::MissingFile {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(SourceError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_str(&text).map_err(|e| SourceError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
