//! End-to-end conversion over in-memory sources: two scenes through
//! generation, linking, aggregation, and merge, checking the relational
//! invariants a downstream consumer depends on.

use sceneforge_convert::{
    convert_scene, generate_global_tables, merge_scenes, ConvertOptions, QualityWarning,
    SceneTables,
};
use sceneforge_ingest::{SceneSource, SourceAnnotation, SourceEgoPose};
use sceneforge_schema::{Chainable, Modality, SampleDataRecord};
use sceneforge_tokens::TokenRegistry;
use std::collections::HashMap;
use std::path::PathBuf;

fn ego_pose(timestamp_ns: u64) -> SourceEgoPose {
    serde_json::from_value(serde_json::json!({
        "timestamp_ns": timestamp_ns,
        "tx_m": 1.0, "ty_m": 2.0, "tz_m": 0.0,
        "qw": 1.0, "qx": 0.0, "qy": 0.0, "qz": 0.0
    }))
    .unwrap()
}

fn annotation(track: Option<&str>, category: &str, timestamp_ns: u64) -> SourceAnnotation {
    let mut value = serde_json::json!({
        "category": category,
        "timestamp_ns": timestamp_ns,
        "tx_m": 5.0, "ty_m": 1.0, "tz_m": 0.5,
        "length_m": 4.2, "width_m": 1.8, "height_m": 1.5,
        "qw": 1.0, "qx": 0.0, "qy": 0.0, "qz": 0.0,
        "num_interior_pts": 42
    });
    if let Some(track) = track {
        value["track_uuid"] = serde_json::json!(track);
    }
    serde_json::from_value(value).unwrap()
}

fn source(scene: u32, timestamps: &[u64], annotations: Vec<SourceAnnotation>) -> SceneSource {
    SceneSource {
        scene,
        dir: PathBuf::new(),
        ego_poses: timestamps.iter().map(|&t| ego_pose(t)).collect(),
        annotations: Some(annotations),
        intrinsics: Vec::new(),
        extrinsics: Vec::new(),
        dropped: Vec::new(),
    }
}

fn lidar_chain(tables: &SceneTables) -> Vec<&SampleDataRecord> {
    tables
        .sample_data
        .iter()
        .filter(|sd| sd.filename.contains("/lidar/"))
        .collect()
}

/// Walk `next` links from the chain head and count the reachable records.
fn walk_forward<'a, T: Chainable>(records: &'a [T]) -> Vec<&'a T> {
    let by_token: HashMap<&str, &T> = records.iter().map(|r| (r.token(), r)).collect();
    let mut current = records.iter().find(|r| r.prev().is_empty());
    let mut visited = Vec::new();
    while let Some(record) = current {
        visited.push(record);
        current = match record.next() {
            "" => None,
            token => by_token.get(token).copied(),
        };
    }
    visited
}

#[test]
fn per_channel_chains_do_not_cross_scene_boundaries() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();

    let (scene1, _) = convert_scene(&source(1, &[10, 20, 30], vec![]), &mut registry, &options);
    let (scene2, _) = convert_scene(&source(2, &[40, 50], vec![]), &mut registry, &options);

    let chain1 = lidar_chain(&scene1);
    let chain2 = lidar_chain(&scene2);
    assert_eq!(chain1.len(), 3);
    assert_eq!(chain2.len(), 2);

    // Scene 1's chain terminates; it must not point into scene 2.
    assert_eq!(chain1.last().unwrap().next, "");
    assert_eq!(chain2.first().unwrap().prev, "");

    let merged = merge_scenes(vec![scene1, scene2]).unwrap();
    let lidar_total = merged
        .sample_data
        .iter()
        .filter(|sd| sd.filename.contains("/lidar/"))
        .count();
    assert_eq!(lidar_total, 5);
}

#[test]
fn sample_chains_are_symmetric_and_complete() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, _) = convert_scene(&source(1, &[10, 20, 30, 40], vec![]), &mut registry, &options);

    let by_token: HashMap<&str, _> = tables.samples.iter().map(|s| (s.token.as_str(), s)).collect();
    for sample in &tables.samples {
        if !sample.next.is_empty() {
            let successor = by_token[sample.next.as_str()];
            assert_eq!(successor.prev, sample.token);
        }
    }
    assert_eq!(walk_forward(&tables.samples).len(), tables.samples.len());
}

#[test]
fn scene_record_brackets_the_sample_sequence() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, _) = convert_scene(&source(3, &[10, 20, 30], vec![]), &mut registry, &options);

    assert_eq!(tables.scene_record.nbr_samples, 3);
    assert_eq!(tables.scene_record.first_sample_token, tables.samples[0].token);
    assert_eq!(tables.scene_record.last_sample_token, tables.samples[2].token);
    assert_eq!(tables.scene_record.log_token, tables.log.token);
    for sample in &tables.samples {
        assert_eq!(sample.scene_token, tables.scene_record.token);
    }
}

#[test]
fn tracks_aggregate_by_frame_order_across_the_pipeline() {
    // T1 arrives out of frame order (0, 2, 1, 3), T2 in order.
    let annotations = vec![
        annotation(Some("T1"), "REGULAR_VEHICLE", 10),
        annotation(Some("T1"), "REGULAR_VEHICLE", 30),
        annotation(Some("T1"), "REGULAR_VEHICLE", 20),
        annotation(Some("T1"), "REGULAR_VEHICLE", 40),
        annotation(Some("T2"), "PEDESTRIAN", 10),
        annotation(Some("T2"), "PEDESTRIAN", 20),
    ];
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, report) = convert_scene(
        &source(1, &[10, 20, 30, 40], annotations),
        &mut registry,
        &options,
    );
    assert!(report.warnings.is_empty());
    assert_eq!(tables.instances.len(), 2);

    let t1 = &tables.instances[0];
    assert_eq!(t1.nbr_annotations, 4);

    // The chain visits frames 10 -> 20 -> 30 -> 40 regardless of array order.
    let t1_annotations: Vec<_> = tables
        .sample_annotations
        .iter()
        .filter(|a| a.instance_token == t1.token)
        .cloned()
        .collect();
    let chain = walk_forward(&t1_annotations);
    assert_eq!(chain.len(), 4);
    let frames: Vec<&str> = chain.iter().map(|a| a.sample_token.as_str()).collect();
    assert_eq!(frames[0], tables.samples[0].token);
    assert_eq!(frames[1], tables.samples[1].token);
    assert_eq!(frames[2], tables.samples[2].token);
    assert_eq!(frames[3], tables.samples[3].token);
    assert_eq!(t1.first_annotation_token, chain[0].token);
    assert_eq!(t1.last_annotation_token, chain[3].token);

    let t2 = &tables.instances[1];
    assert_eq!(t2.nbr_annotations, 2);
}

#[test]
fn unknown_category_defaults_with_a_warning() {
    let annotations = vec![annotation(Some("T1"), "HOVERCRAFT", 10)];
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, report) = convert_scene(&source(1, &[10], annotations), &mut registry, &options);

    let default_token = registry
        .lookup(&sceneforge_tokens::TokenKey::Category {
            name: "vehicle".to_string(),
        })
        .unwrap()
        .to_string();
    assert_eq!(tables.sample_annotations[0].category_token, default_token);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, QualityWarning::UnknownCategory { label } if label == "HOVERCRAFT")));
}

#[test]
fn non_monotonic_timestamps_are_reported_but_chained() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, report) = convert_scene(&source(1, &[30, 10, 20], vec![]), &mut registry, &options);

    assert!(report.warnings.iter().any(|w| matches!(
        w,
        QualityWarning::NonMonotonicTimestamps { table: "sample", position: 1 }
    )));
    // Chain still follows array order.
    assert_eq!(tables.samples[0].next, tables.samples[1].token);
    assert_eq!(walk_forward(&tables.samples).len(), 3);
}

#[test]
fn calibration_defaults_are_data_quality_warnings() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, report) = convert_scene(&source(1, &[10], vec![]), &mut registry, &options);

    // No extrinsics document at all: every channel defaults to identity.
    assert_eq!(
        report
            .warnings
            .iter()
            .filter(|w| matches!(w, QualityWarning::MissingExtrinsics { .. }))
            .count(),
        10
    );
    for calib in &tables.calibrated_sensors {
        assert_eq!(calib.translation, [0.0, 0.0, 0.0]);
        assert_eq!(calib.rotation, [0.0, 0.0, 0.0, 1.0]);
    }
}

#[test]
fn sample_data_references_resolve_within_the_scene() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, _) = convert_scene(&source(1, &[10, 20], vec![]), &mut registry, &options);

    let sample_tokens: Vec<&str> = tables.samples.iter().map(|s| s.token.as_str()).collect();
    let ego_tokens: Vec<&str> = tables.ego_poses.iter().map(|e| e.token.as_str()).collect();
    let calib_tokens: Vec<&str> = tables
        .calibrated_sensors
        .iter()
        .map(|c| c.token.as_str())
        .collect();

    assert_eq!(tables.sample_data.len(), 2 * 10);
    for sd in &tables.sample_data {
        assert!(sample_tokens.contains(&sd.sample_token.as_str()));
        assert!(ego_tokens.contains(&sd.ego_pose_token.as_str()));
        assert!(calib_tokens.contains(&sd.calibrated_sensor_token.as_str()));
    }
}

#[test]
fn global_tables_cover_the_channel_and_lookup_sets() {
    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let global = generate_global_tables(&mut registry, &options, vec!["logtok".to_string()]);

    assert_eq!(global.sensors.len(), 10);
    assert_eq!(
        global
            .sensors
            .iter()
            .filter(|s| s.modality == Modality::Lidar)
            .count(),
        1
    );
    assert_eq!(global.categories.len(), 10);
    assert_eq!(global.attributes.len(), 2);
    let visibility_tokens: Vec<&str> =
        global.visibilities.iter().map(|v| v.token.as_str()).collect();
    assert_eq!(visibility_tokens, vec!["1", "2", "3", "4"]);
    assert_eq!(global.maps[0].log_tokens, vec!["logtok".to_string()]);
}

#[test]
fn camera_intrinsics_flow_into_calibration_and_sample_data() {
    let mut scene = source(1, &[10], vec![]);
    scene.intrinsics = serde_json::from_value(serde_json::json!([{
        "sensor_name": "ring_front_center",
        "fx_px": 1686.0, "fy_px": 1686.3, "cx_px": 775.8, "cy_px": 1020.3,
        "k1": -0.25, "k2": 0.08, "k3": -0.01,
        "width_px": 1550, "height_px": 2048
    }]))
    .unwrap();
    scene.extrinsics = serde_json::from_value(serde_json::json!([{
        "sensor_name": "ring_front_center",
        "tx_m": 1.6, "ty_m": 0.0, "tz_m": 1.4,
        "qw": 0.5, "qx": -0.5, "qy": 0.5, "qz": -0.5
    }]))
    .unwrap();

    let mut registry = TokenRegistry::new();
    let options = ConvertOptions::default();
    let (tables, _) = convert_scene(&scene, &mut registry, &options);

    let calib = tables
        .calibrated_sensors
        .iter()
        .find(|c| {
            registry
                .name_of(&c.token)
                .is_some_and(|name| name.contains("ring_front_center"))
        })
        .unwrap();
    assert_eq!(calib.camera_intrinsic[0], [1686.0, 0.0, 775.8]);
    assert_eq!(calib.camera_intrinsic[2], [0.0, 0.0, 1.0]);
    assert_eq!(calib.translation, [1.6, 0.0, 1.4]);
    assert_eq!(calib.resolution, vec![1550, 2048]);

    let sd = tables
        .sample_data
        .iter()
        .find(|sd| sd.filename.contains("/ring_front_center/"))
        .unwrap();
    assert_eq!((sd.width, sd.height), (1550, 2048));
    assert_eq!(sd.fileformat, "jpg");

    let lidar = tables
        .sample_data
        .iter()
        .find(|sd| sd.filename.contains("/lidar/"))
        .unwrap();
    assert_eq!((lidar.width, lidar.height), (0, 0));
    assert_eq!(lidar.fileformat, "bin");
}
