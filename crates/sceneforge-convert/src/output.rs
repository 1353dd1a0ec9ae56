//! Output writer
//!
//! One JSON document per target table, each an array of flat objects, plus
//! `tokens_map.json` exposing the full name→token registry for audits and
//! re-runs. Generators stay I/O-free; this is the single place bytes hit
//! disk.

use crate::{GlobalTables, MergedTables, SceneTables};
use sceneforge_tokens::TokenRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] sceneforge_tokens::RegistryError),
}

/// Write one table as a pretty-printed JSON array.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(rows).map_err(|source| OutputError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Write the thirteen target tables plus `tokens_map.json` under `out_dir`.
pub fn write_tables(
    out_dir: &Path,
    global: &GlobalTables,
    merged: &MergedTables,
    registry: &TokenRegistry,
) -> Result<(), OutputError> {
    std::fs::create_dir_all(out_dir).map_err(|source| OutputError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    write_table(&out_dir.join("sensor.json"), &global.sensors)?;
    write_table(
        &out_dir.join("calibrated_sensor.json"),
        &merged.calibrated_sensors,
    )?;
    write_table(&out_dir.join("log.json"), &merged.logs)?;
    write_table(&out_dir.join("scene.json"), &merged.scenes)?;
    write_table(&out_dir.join("sample.json"), &merged.samples)?;
    write_table(&out_dir.join("sample_data.json"), &merged.sample_data)?;
    write_table(&out_dir.join("ego_pose.json"), &merged.ego_poses)?;
    write_table(&out_dir.join("category.json"), &global.categories)?;
    write_table(&out_dir.join("attribute.json"), &global.attributes)?;
    write_table(&out_dir.join("visibility.json"), &global.visibilities)?;
    write_table(&out_dir.join("instance.json"), &merged.instances)?;
    write_table(
        &out_dir.join("sample_annotation.json"),
        &merged.sample_annotations,
    )?;
    write_table(&out_dir.join("map.json"), &global.maps)?;

    registry.save(&out_dir.join("tokens_map.json"))?;

    info!(
        out_dir = %out_dir.display(),
        tokens = registry.len(),
        "target tables written"
    );
    Ok(())
}

/// Write one scene's table set under `out_dir`, without the global lookup
/// tables. Used to preserve per-scene work when a cross-scene merge fails.
pub fn write_scene_tables(out_dir: &Path, tables: &SceneTables) -> Result<(), OutputError> {
    std::fs::create_dir_all(out_dir).map_err(|source| OutputError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    write_table(&out_dir.join("log.json"), std::slice::from_ref(&tables.log))?;
    write_table(
        &out_dir.join("scene.json"),
        std::slice::from_ref(&tables.scene_record),
    )?;
    write_table(&out_dir.join("sample.json"), &tables.samples)?;
    write_table(&out_dir.join("sample_data.json"), &tables.sample_data)?;
    write_table(&out_dir.join("ego_pose.json"), &tables.ego_poses)?;
    write_table(
        &out_dir.join("calibrated_sensor.json"),
        &tables.calibrated_sensors,
    )?;
    write_table(&out_dir.join("instance.json"), &tables.instances)?;
    write_table(
        &out_dir.join("sample_annotation.json"),
        &tables.sample_annotations,
    )?;

    info!(scene = tables.scene, out_dir = %out_dir.display(), "scene tables written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{convert_scene, generate_global_tables, merge_scenes, ConvertOptions};
    use sceneforge_ingest::SceneSource;
    use std::path::PathBuf;

    #[test]
    fn writes_every_table_and_the_token_map() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = TokenRegistry::new();
        let options = ConvertOptions::default();

        let source = SceneSource {
            scene: 1,
            dir: PathBuf::new(),
            ego_poses: serde_json::from_str(r#"[{"timestamp_ns": 10}, {"timestamp_ns": 20}]"#)
                .unwrap(),
            annotations: Some(Vec::new()),
            intrinsics: Vec::new(),
            extrinsics: Vec::new(),
            dropped: Vec::new(),
        };
        let (tables, _) = convert_scene(&source, &mut registry, &options);
        let log_token = tables.log.token.clone();
        let merged = merge_scenes(vec![tables]).unwrap();
        let global = generate_global_tables(&mut registry, &options, vec![log_token]);

        write_tables(dir.path(), &global, &merged, &registry).unwrap();

        for table in [
            "sensor",
            "calibrated_sensor",
            "log",
            "scene",
            "sample",
            "sample_data",
            "ego_pose",
            "category",
            "attribute",
            "visibility",
            "instance",
            "sample_annotation",
            "map",
            "tokens_map",
        ] {
            let path = dir.path().join(format!("{table}.json"));
            assert!(path.exists(), "{table}.json missing");
        }

        let samples: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("sample.json")).unwrap())
                .unwrap();
        assert_eq!(samples.as_array().unwrap().len(), 2);
    }

    #[test]
    fn scene_tables_persist_standalone() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = TokenRegistry::new();
        let options = ConvertOptions::default();

        let source = SceneSource {
            scene: 7,
            dir: PathBuf::new(),
            ego_poses: serde_json::from_str(r#"[{"timestamp_ns": 10}, {"timestamp_ns": 20}]"#)
                .unwrap(),
            annotations: Some(Vec::new()),
            intrinsics: Vec::new(),
            extrinsics: Vec::new(),
            dropped: Vec::new(),
        };
        let (tables, _) = convert_scene(&source, &mut registry, &options);

        let scene_dir = dir.path().join("scene_7");
        write_scene_tables(&scene_dir, &tables).unwrap();

        for table in [
            "log",
            "scene",
            "sample",
            "sample_data",
            "ego_pose",
            "calibrated_sensor",
            "instance",
            "sample_annotation",
        ] {
            assert!(
                scene_dir.join(format!("{table}.json")).exists(),
                "{table}.json missing"
            );
        }
        let samples: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(scene_dir.join("sample.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(samples.as_array().unwrap().len(), 2);
    }
}
