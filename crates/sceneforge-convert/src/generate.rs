//! Entity generators
//!
//! One generator per target table. Each is a pure function of (typed source
//! records, token registry); file I/O lives in [`crate::output`], so the
//! generators compose in the pipeline or run standalone.
//!
//! Token keys are built through [`TokenKey`] only. Per-scene entities embed
//! the scene number in their key, global lookup tables do not.

use crate::chain;
use crate::report::{QualityWarning, SceneReport};
use crate::ConvertOptions;
use sceneforge_ingest::{SourceAnnotation, SourceEgoPose, SourceExtrinsics, SourceIntrinsics};
use sceneforge_schema::{
    AttributeRecord, CalibratedSensorRecord, CategoryRecord, EgoPoseRecord, LogRecord, MapRecord,
    Modality, SampleAnnotationRecord, SampleDataRecord, SampleRecord, SceneRecord, SensorRecord,
    VisibilityRecord,
};
use sceneforge_tokens::{TokenKey, TokenRegistry};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Fixed tables
// ============================================================================

/// The capture rig's channels. The lidar plus seven ring cameras and the
/// front stereo pair.
pub const CHANNELS: &[(&str, Modality)] = &[
    ("lidar", Modality::Lidar),
    ("ring_front_left", Modality::Camera),
    ("ring_front_right", Modality::Camera),
    ("ring_front_center", Modality::Camera),
    ("ring_rear_left", Modality::Camera),
    ("ring_rear_right", Modality::Camera),
    ("ring_side_left", Modality::Camera),
    ("ring_side_right", Modality::Camera),
    ("stereo_front_left", Modality::Camera),
    ("stereo_front_right", Modality::Camera),
];

/// Canonical categories: (name, description).
const CATEGORIES: &[(&str, &str)] = &[
    ("pedestrian", "Pedestrian"),
    ("vehicle", "Regular vehicle"),
    ("bus", "Bus"),
    ("truck", "Truck"),
    ("bicycle", "Bicycle"),
    ("bicyclist", "Bicyclist"),
    ("cone", "Construction cone"),
    ("sign", "Traffic sign"),
    ("bollard", "Bollard"),
    ("large_vehicle", "Large vehicle"),
];

/// Source label → canonical category name.
const SOURCE_CATEGORY_LABELS: &[(&str, &str)] = &[
    ("PEDESTRIAN", "pedestrian"),
    ("REGULAR_VEHICLE", "vehicle"),
    ("BUS", "bus"),
    ("TRUCK_CAB", "truck"),
    ("BICYCLE", "bicycle"),
    ("BICYCLIST", "bicyclist"),
    ("CONSTRUCTION_CONE", "cone"),
    ("SIGN", "sign"),
    ("BOLLARD", "bollard"),
    ("LARGE_VEHICLE", "large_vehicle"),
];

/// Fallback for labels outside the lookup table. Mapping is total.
pub const DEFAULT_CATEGORY: &str = "vehicle";

const ATTRIBUTES: &[(&str, &str)] = &[
    ("vehicle.moving", "Moving vehicle"),
    ("vehicle.stopped", "Stopped vehicle"),
];

/// Attribute attached to annotations; the source carries no attribute signal.
pub const DEFAULT_ATTRIBUTE: &str = "vehicle.moving";

/// Visibility bins with their fixed, externally dictated tokens.
const VISIBILITY_LEVELS: &[(u8, &str, &str)] = &[
    (1, "v0-40", "Poor visibility (0-40%)"),
    (2, "v40-60", "Partial visibility (40-60%)"),
    (3, "v60-80", "Good visibility (60-80%)"),
    (4, "v80-100", "Excellent visibility (80-100%)"),
];

/// The source has no per-box visibility estimate; boxes default to the top
/// bin.
pub const DEFAULT_VISIBILITY_TOKEN: &str = "4";

// ============================================================================
// Global lookup tables
// ============================================================================

pub fn generate_sensors(registry: &mut TokenRegistry) -> Vec<SensorRecord> {
    CHANNELS
        .iter()
        .map(|&(channel, modality)| SensorRecord {
            token: registry.get(&TokenKey::Sensor {
                channel: channel.to_string(),
            }),
            channel: channel.to_string(),
            modality,
        })
        .collect()
}

pub fn generate_categories(registry: &mut TokenRegistry) -> Vec<CategoryRecord> {
    CATEGORIES
        .iter()
        .map(|&(name, description)| CategoryRecord {
            token: registry.get(&TokenKey::Category {
                name: name.to_string(),
            }),
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn generate_attributes(registry: &mut TokenRegistry) -> Vec<AttributeRecord> {
    ATTRIBUTES
        .iter()
        .map(|&(name, description)| AttributeRecord {
            token: registry.get(&TokenKey::Attribute {
                name: name.to_string(),
            }),
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn generate_visibilities(registry: &mut TokenRegistry) -> Vec<VisibilityRecord> {
    VISIBILITY_LEVELS
        .iter()
        .map(|&(level, name, description)| VisibilityRecord {
            token: registry.ensure_consistent(&TokenKey::Visibility { level }, &level.to_string()),
            level: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn generate_maps(
    registry: &mut TokenRegistry,
    options: &ConvertOptions,
    log_tokens: Vec<String>,
) -> Vec<MapRecord> {
    vec![MapRecord {
        token: registry.get(&TokenKey::Map {
            name: "semantic_prior".to_string(),
        }),
        category: "semantic_prior".to_string(),
        filename: options.map_filename.clone(),
        log_tokens,
    }]
}

// ============================================================================
// Scene hierarchy
// ============================================================================

pub fn generate_log(
    registry: &mut TokenRegistry,
    scene: u32,
    options: &ConvertOptions,
) -> LogRecord {
    LogRecord {
        token: registry.get(&TokenKey::Log { scene }),
        logfile: format!("{}_{}", options.dataset, scene),
        vehicle: options.vehicle.clone(),
        location: options.location.clone(),
        date_captured: options.date_captured.clone(),
    }
}

/// Scene row. First/last sample tokens come from the already generated
/// sample sequence; an empty scene gets empty boundary tokens.
pub fn generate_scene(
    registry: &mut TokenRegistry,
    scene: u32,
    samples: &[SampleRecord],
    options: &ConvertOptions,
) -> SceneRecord {
    SceneRecord {
        token: registry.get(&TokenKey::Scene { scene }),
        log_token: registry.get(&TokenKey::Log { scene }),
        nbr_samples: samples.len(),
        first_sample_token: samples.first().map(|s| s.token.clone()).unwrap_or_default(),
        last_sample_token: samples.last().map(|s| s.token.clone()).unwrap_or_default(),
        name: format!("{}_{}", options.dataset, scene),
        description: format!(
            "{} scene {} with {} samples",
            options.dataset,
            scene,
            samples.len()
        ),
    }
}

pub fn generate_ego_poses(
    registry: &mut TokenRegistry,
    scene: u32,
    poses: &[SourceEgoPose],
    timestamps: &[u64],
) -> Vec<EgoPoseRecord> {
    poses
        .iter()
        .zip(timestamps)
        .enumerate()
        .map(|(frame, (pose, &timestamp))| EgoPoseRecord {
            token: registry.get(&TokenKey::EgoPose {
                scene,
                frame: frame as u32,
            }),
            timestamp,
            translation: pose.translation(),
            rotation: pose.rotation(),
        })
        .collect()
}

/// Sample rows in frame order. Link fields are left empty for the linker.
pub fn generate_samples(
    registry: &mut TokenRegistry,
    scene: u32,
    timestamps: &[u64],
) -> Vec<SampleRecord> {
    let scene_token = registry.get(&TokenKey::Scene { scene });
    timestamps
        .iter()
        .enumerate()
        .map(|(frame, &timestamp)| SampleRecord {
            token: registry.get(&TokenKey::Sample {
                scene,
                frame: frame as u32,
            }),
            timestamp,
            prev: String::new(),
            next: String::new(),
            scene_token: scene_token.clone(),
        })
        .collect()
}

/// One chain of sample-data rows per channel, already linked. The flat
/// output is channel-major; chain order within a channel is frame order.
pub fn generate_sample_data(
    registry: &mut TokenRegistry,
    scene: u32,
    timestamps: &[u64],
    intrinsics: &[SourceIntrinsics],
    options: &ConvertOptions,
) -> Vec<SampleDataRecord> {
    let resolutions: HashMap<&str, (u32, u32)> = intrinsics
        .iter()
        .map(|i| (i.sensor_name.as_str(), (i.width_px, i.height_px)))
        .collect();

    let mut entries = Vec::with_capacity(CHANNELS.len() * timestamps.len());
    for &(channel, modality) in CHANNELS {
        let extension = match modality {
            Modality::Camera => "jpg",
            Modality::Lidar => "bin",
        };
        let (width, height) = match modality {
            Modality::Camera => resolutions.get(channel).copied().unwrap_or((0, 0)),
            Modality::Lidar => (0, 0),
        };

        let mut channel_chain: Vec<SampleDataRecord> = timestamps
            .iter()
            .enumerate()
            .map(|(frame, &timestamp)| SampleDataRecord {
                token: registry.get(&TokenKey::SampleData {
                    scene,
                    channel: channel.to_string(),
                    frame: frame as u32,
                }),
                sample_token: registry.get(&TokenKey::Sample {
                    scene,
                    frame: frame as u32,
                }),
                ego_pose_token: registry.get(&TokenKey::EgoPose {
                    scene,
                    frame: frame as u32,
                }),
                calibrated_sensor_token: registry.get(&TokenKey::CalibratedSensor {
                    scene,
                    channel: channel.to_string(),
                }),
                filename: format!(
                    "samples/{channel}/{}_{}_{frame:08}.{extension}",
                    options.dataset, scene
                ),
                fileformat: extension.to_string(),
                timestamp,
                is_key_frame: true,
                height,
                width,
                prev: String::new(),
                next: String::new(),
            })
            .collect();
        chain::link_chain(&mut channel_chain);
        entries.extend(channel_chain);
    }
    entries
}

// ============================================================================
// Calibration
// ============================================================================

/// One calibrated-sensor row per channel for this scene.
///
/// Cameras take their intrinsic matrix from the intrinsics document; every
/// channel takes its mount pose from the extrinsics document. Either absence
/// defaults (empty matrix / identity pose) and is reported as a
/// data-quality warning, not treated as success.
pub fn generate_calibrated_sensors(
    registry: &mut TokenRegistry,
    scene: u32,
    intrinsics: &[SourceIntrinsics],
    extrinsics: &[SourceExtrinsics],
    report: &mut SceneReport,
) -> Vec<CalibratedSensorRecord> {
    let intrinsics_by_name: HashMap<&str, &SourceIntrinsics> = intrinsics
        .iter()
        .map(|i| (i.sensor_name.as_str(), i))
        .collect();
    let extrinsics_by_name: HashMap<&str, &SourceExtrinsics> = extrinsics
        .iter()
        .map(|e| (e.sensor_name.as_str(), e))
        .collect();

    CHANNELS
        .iter()
        .map(|&(channel, modality)| {
            let (camera_intrinsic, distortion, resolution) = match modality {
                Modality::Camera => match intrinsics_by_name.get(channel) {
                    Some(row) => (row.matrix(), row.distortion(), row.resolution()),
                    None => {
                        report.push(QualityWarning::MissingIntrinsics {
                            channel: channel.to_string(),
                        });
                        (Vec::new(), Vec::new(), Vec::new())
                    }
                },
                Modality::Lidar => (Vec::new(), Vec::new(), Vec::new()),
            };

            let (translation, rotation) = match extrinsics_by_name.get(channel) {
                Some(row) => (row.translation(), row.rotation()),
                None => {
                    report.push(QualityWarning::MissingExtrinsics {
                        channel: channel.to_string(),
                    });
                    ([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])
                }
            };

            CalibratedSensorRecord {
                token: registry.get(&TokenKey::CalibratedSensor {
                    scene,
                    channel: channel.to_string(),
                }),
                sensor_token: registry.get(&TokenKey::Sensor {
                    channel: channel.to_string(),
                }),
                translation,
                rotation,
                camera_intrinsic,
                distortion,
                resolution,
            }
        })
        .collect()
}

// ============================================================================
// Annotations
// ============================================================================

/// Map a source category label onto the canonical table. Unknown or missing
/// labels resolve to [`DEFAULT_CATEGORY`]; each distinct unknown label is
/// reported once per scene.
fn canonical_category<'a>(
    label: Option<&'a str>,
    warned: &mut HashSet<String>,
    report: &mut SceneReport,
) -> &'static str {
    if let Some(label) = label {
        if let Some(&(_, canonical)) = SOURCE_CATEGORY_LABELS.iter().find(|&&(l, _)| l == label) {
            return canonical;
        }
    }
    let label = label.unwrap_or("").to_string();
    if warned.insert(label.clone()) {
        report.push(QualityWarning::UnknownCategory { label });
    }
    DEFAULT_CATEGORY
}

/// Annotation rows plus the per-row ordering data the track aggregator
/// needs: the resolved frame index and the source track id.
#[derive(Debug, Default)]
pub struct AnnotationBatch {
    pub records: Vec<SampleAnnotationRecord>,
    pub frames: Vec<usize>,
    pub tracks: Vec<Option<String>>,
}

/// Generate annotation rows for one scene.
///
/// Frames resolve by exact timestamp match against the scene timeline;
/// a missing or unmatched timestamp falls back to the annotation's position,
/// clamped to the last frame, and is reported. `instance_token` and the
/// link fields are filled by the track aggregator.
pub fn generate_sample_annotations(
    registry: &mut TokenRegistry,
    scene: u32,
    annotations: &[SourceAnnotation],
    timestamps: &[u64],
    report: &mut SceneReport,
) -> AnnotationBatch {
    if timestamps.is_empty() {
        if !annotations.is_empty() {
            report.push(QualityWarning::AnnotationsWithoutFrames);
        }
        return AnnotationBatch::default();
    }

    let frame_by_timestamp: HashMap<u64, usize> = timestamps
        .iter()
        .enumerate()
        .map(|(frame, &t)| (t, frame))
        .collect();
    let last_frame = timestamps.len() - 1;

    let attribute_token = registry.get(&TokenKey::Attribute {
        name: DEFAULT_ATTRIBUTE.to_string(),
    });
    let mut warned_labels = HashSet::new();

    let mut batch = AnnotationBatch::default();
    for (index, ann) in annotations.iter().enumerate() {
        let frame = match ann.timestamp_ns.and_then(|t| frame_by_timestamp.get(&t)) {
            Some(&frame) => frame,
            None => {
                report.push(QualityWarning::UnresolvedAnnotationFrame { index });
                index.min(last_frame)
            }
        };
        batch.frames.push(frame);
        batch.tracks.push(ann.track_uuid.clone());

        let category = canonical_category(ann.category.as_deref(), &mut warned_labels, report);
        batch.records.push(SampleAnnotationRecord {
            token: registry.get(&TokenKey::Annotation {
                scene,
                index: index as u32,
            }),
            sample_token: registry.get(&TokenKey::Sample {
                scene,
                frame: frame as u32,
            }),
            instance_token: String::new(),
            category_token: registry.get(&TokenKey::Category {
                name: category.to_string(),
            }),
            visibility_token: DEFAULT_VISIBILITY_TOKEN.to_string(),
            attribute_tokens: vec![attribute_token.clone()],
            translation: ann.translation(),
            size: ann.size(),
            rotation: ann.rotation(),
            prev: String::new(),
            next: String::new(),
            num_lidar_pts: ann.lidar_points(),
            num_radar_pts: 0,
        });
    }
    batch
}
