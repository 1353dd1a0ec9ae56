//! Per-scene quality reporting and the run summary
//!
//! Defaults and fallbacks are data-quality signals, not successes. Every
//! one of them lands here as a structured warning attached to its scene, in
//! addition to the `tracing` event emitted at the point of detection.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// A recoverable data-quality finding for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    #[error("sensor {channel} has no extrinsics, mount pose defaulted to identity")]
    MissingExtrinsics { channel: String },

    #[error("camera {channel} has no intrinsics, intrinsic matrix left empty")]
    MissingIntrinsics { channel: String },

    #[error("unknown category label {label:?}, mapped to the default category")]
    UnknownCategory { label: String },

    #[error("annotation {index} has no usable timestamp, frame resolved positionally")]
    UnresolvedAnnotationFrame { index: usize },

    #[error("annotations present but the scene has no frames, annotation tables omitted")]
    AnnotationsWithoutFrames,

    #[error("non-monotonic timestamps in {table} at position {position}, chain kept in array order")]
    NonMonotonicTimestamps { table: &'static str, position: usize },

    #[error("source document {file} unavailable ({message}), dependent tables omitted")]
    DroppedDocument { file: &'static str, message: String },
}

/// Quality findings for one converted scene.
#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub scene: u32,
    pub frames: usize,
    pub warnings: Vec<QualityWarning>,
}

impl SceneReport {
    pub fn new(scene: u32, frames: usize) -> Self {
        Self {
            scene,
            frames,
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, warning: QualityWarning) {
        warn!(scene = self.scene, %warning, "data quality");
        self.warnings.push(warning);
    }
}

/// A scene that never produced tables.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedScene {
    pub scene: u32,
    pub reason: String,
}

/// What the whole run did: processed scenes with their findings, plus the
/// scenes that were skipped outright.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<SceneReport>,
    pub skipped: Vec<SkippedScene>,
}

impl RunSummary {
    pub fn record_scene(&mut self, report: SceneReport) {
        self.reports.push(report);
    }

    pub fn record_skip(&mut self, scene: u32, reason: String) {
        warn!(scene, %reason, "scene skipped");
        self.skipped.push(SkippedScene { scene, reason });
    }

    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn total_warnings(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum()
    }

    /// The run succeeded if at least one scene made it through.
    pub fn any_succeeded(&self) -> bool {
        !self.reports.is_empty()
    }
}
