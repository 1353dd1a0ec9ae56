//! Sceneforge conversion core
//!
//! Turns typed per-scene source records into the canonical relational
//! tables, in four stages:
//!
//! ```text
//! source records ──► entity generators ──► chain linker ──► scene merger ──► tables
//!                    (token registry)      track aggregator  (collision check)
//! ```
//!
//! Each scene converts independently against a shared [`TokenRegistry`];
//! scene-qualified token keys keep the per-scene namespaces disjoint, so the
//! merge step is concatenation plus a collision check rather than a remap.
//! Failures stay scoped: a scene that cannot load is skipped, a cross-scene
//! token collision aborts only the merge.

pub mod chain;
pub mod generate;
pub mod merge;
pub mod output;
pub mod report;
pub mod tracks;

pub use merge::{check_token_disjointness, merge_scenes, MergeError, MergedTables};
pub use output::{write_scene_tables, write_table, write_tables, OutputError};
pub use report::{QualityWarning, RunSummary, SceneReport, SkippedScene};

use sceneforge_ingest::SceneSource;
use sceneforge_schema::{
    AttributeRecord, CalibratedSensorRecord, CategoryRecord, EgoPoseRecord, InstanceRecord,
    LogRecord, MapRecord, SampleAnnotationRecord, SampleDataRecord, SampleRecord, SceneRecord,
    SensorRecord, VisibilityRecord,
};
use sceneforge_tokens::TokenRegistry;

/// Run-wide settings that end up in log/scene/map metadata.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Dataset prefix used in scene names and log files, e.g. `argov2`.
    pub dataset: String,
    pub vehicle: String,
    pub location: String,
    /// `YYYY-MM-DD`; the CLI defaults this to the conversion date.
    pub date_captured: String,
    pub map_filename: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            dataset: "argov2".to_string(),
            vehicle: "car".to_string(),
            location: "unknown".to_string(),
            date_captured: "1970-01-01".to_string(),
            map_filename: "maps/semantic_prior.png".to_string(),
        }
    }
}

/// Everything one scene contributes to the merged output.
#[derive(Debug, Clone)]
pub struct SceneTables {
    pub scene: u32,
    pub log: LogRecord,
    pub scene_record: SceneRecord,
    pub samples: Vec<SampleRecord>,
    pub sample_data: Vec<SampleDataRecord>,
    pub ego_poses: Vec<EgoPoseRecord>,
    pub calibrated_sensors: Vec<CalibratedSensorRecord>,
    pub instances: Vec<InstanceRecord>,
    pub sample_annotations: Vec<SampleAnnotationRecord>,
}

/// Tables shared by all scenes, generated once per run.
#[derive(Debug, Clone)]
pub struct GlobalTables {
    pub sensors: Vec<SensorRecord>,
    pub categories: Vec<CategoryRecord>,
    pub attributes: Vec<AttributeRecord>,
    pub visibilities: Vec<VisibilityRecord>,
    pub maps: Vec<MapRecord>,
}

/// Convert one loaded scene into its table set.
///
/// Never fails: source problems downgrade to quality warnings on the
/// returned report, and anything that could not be generated is simply
/// absent from the tables.
pub fn convert_scene(
    source: &SceneSource,
    registry: &mut TokenRegistry,
    options: &ConvertOptions,
) -> (SceneTables, SceneReport) {
    let scene = source.scene;
    let mut report = SceneReport::new(scene, source.num_frames());
    for doc in &source.dropped {
        report.push(QualityWarning::DroppedDocument {
            file: doc.file,
            message: doc.error.to_string(),
        });
    }

    let timestamps = sceneforge_ingest::frame_timestamps(&source.ego_poses);
    if let Some(position) = chain::check_monotonic(&timestamps) {
        report.push(QualityWarning::NonMonotonicTimestamps {
            table: "sample",
            position,
        });
    }

    let ego_poses = generate::generate_ego_poses(registry, scene, &source.ego_poses, &timestamps);
    let mut samples = generate::generate_samples(registry, scene, &timestamps);
    chain::link_chain(&mut samples);

    let sample_data = generate::generate_sample_data(
        registry,
        scene,
        &timestamps,
        &source.intrinsics,
        options,
    );
    let calibrated_sensors = generate::generate_calibrated_sensors(
        registry,
        scene,
        &source.intrinsics,
        &source.extrinsics,
        &mut report,
    );

    let mut batch = match &source.annotations {
        Some(annotations) => generate::generate_sample_annotations(
            registry,
            scene,
            annotations,
            &timestamps,
            &mut report,
        ),
        None => generate::AnnotationBatch::default(),
    };
    let instances = tracks::aggregate_tracks(registry, scene, &mut batch);

    let log = generate::generate_log(registry, scene, options);
    let scene_record = generate::generate_scene(registry, scene, &samples, options);

    let tables = SceneTables {
        scene,
        log,
        scene_record,
        samples,
        sample_data,
        ego_poses,
        calibrated_sensors,
        instances,
        sample_annotations: batch.records,
    };
    (tables, report)
}

/// Generate the run-wide lookup tables. `log_tokens` are the tokens of
/// every successfully converted scene's log, referenced by the map record.
pub fn generate_global_tables(
    registry: &mut TokenRegistry,
    options: &ConvertOptions,
    log_tokens: Vec<String>,
) -> GlobalTables {
    GlobalTables {
        sensors: generate::generate_sensors(registry),
        categories: generate::generate_categories(registry),
        attributes: generate::generate_attributes(registry),
        visibilities: generate::generate_visibilities(registry),
        maps: generate::generate_maps(registry, options, log_tokens),
    }
}
