//! Scene merger
//!
//! Takes N independently generated, internally linked scene table sets and
//! concatenates them into one output. The scene-qualified token keys make
//! collisions impossible by construction; the merger still verifies that no
//! token appears in two input record sets and fails fast if one does,
//! rather than silently overwriting. Per-scene outputs generated before a
//! failed merge are left untouched.

use crate::SceneTables;
use sceneforge_schema::{
    CalibratedSensorRecord, EgoPoseRecord, InstanceRecord, LogRecord, SampleAnnotationRecord,
    SampleDataRecord, SampleRecord, SceneRecord,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// One token claimed by two scenes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCollision {
    pub token: String,
    pub first_scene: u32,
    pub second_scene: u32,
}

impl fmt::Display for TokenCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "token {} appears in scenes {} and {}",
            self.token, self.first_scene, self.second_scene
        )
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("token collision between scenes: {}", format_collisions(.0))]
    TokenCollision(Vec<TokenCollision>),
}

fn format_collisions(collisions: &[TokenCollision]) -> String {
    let shown: Vec<String> = collisions.iter().take(5).map(|c| c.to_string()).collect();
    if collisions.len() > shown.len() {
        format!("{} (+{} more)", shown.join("; "), collisions.len() - shown.len())
    } else {
        shown.join("; ")
    }
}

/// The concatenated per-scene tables.
#[derive(Debug, Clone, Default)]
pub struct MergedTables {
    pub logs: Vec<LogRecord>,
    pub scenes: Vec<SceneRecord>,
    pub samples: Vec<SampleRecord>,
    pub sample_data: Vec<SampleDataRecord>,
    pub ego_poses: Vec<EgoPoseRecord>,
    pub calibrated_sensors: Vec<CalibratedSensorRecord>,
    pub instances: Vec<InstanceRecord>,
    pub sample_annotations: Vec<SampleAnnotationRecord>,
}

/// Verify that no token is owned by two of the input record sets.
///
/// Ownership is tracked per input set, not per claimed scene number, so two
/// sets carrying the same scene number still collide. Every collision is
/// collected before failing so the error names all offending scene pairs,
/// not just the first.
pub fn check_token_disjointness(scenes: &[SceneTables]) -> Result<(), MergeError> {
    let mut owner: HashMap<String, (usize, u32)> = HashMap::new();
    let mut collisions = Vec::new();
    for (set, tables) in scenes.iter().enumerate() {
        for token in scene_tokens(tables) {
            match owner.get(token) {
                Some(&(first_set, first_scene)) if first_set != set => {
                    collisions.push(TokenCollision {
                        token: token.to_string(),
                        first_scene,
                        second_scene: tables.scene,
                    })
                }
                _ => {
                    owner.insert(token.to_string(), (set, tables.scene));
                }
            }
        }
    }
    if collisions.is_empty() {
        Ok(())
    } else {
        Err(MergeError::TokenCollision(collisions))
    }
}

/// Merge scene table sets, verifying token disjointness first.
pub fn merge_scenes(scenes: Vec<SceneTables>) -> Result<MergedTables, MergeError> {
    check_token_disjointness(&scenes)?;

    let mut merged = MergedTables::default();
    for tables in scenes {
        merged.logs.push(tables.log);
        merged.scenes.push(tables.scene_record);
        merged.samples.extend(tables.samples);
        merged.sample_data.extend(tables.sample_data);
        merged.ego_poses.extend(tables.ego_poses);
        merged.calibrated_sensors.extend(tables.calibrated_sensors);
        merged.instances.extend(tables.instances);
        merged.sample_annotations.extend(tables.sample_annotations);
    }
    Ok(merged)
}

/// Every token owned by this scene's record set. Reference fields (sample
/// tokens inside sample_data, category tokens, ...) are deliberately not
/// included: only ownership matters for disjointness.
fn scene_tokens(tables: &SceneTables) -> impl Iterator<Item = &str> {
    std::iter::once(tables.log.token.as_str())
        .chain(std::iter::once(tables.scene_record.token.as_str()))
        .chain(tables.samples.iter().map(|r| r.token.as_str()))
        .chain(tables.sample_data.iter().map(|r| r.token.as_str()))
        .chain(tables.ego_poses.iter().map(|r| r.token.as_str()))
        .chain(tables.calibrated_sensors.iter().map(|r| r.token.as_str()))
        .chain(tables.instances.iter().map(|r| r.token.as_str()))
        .chain(tables.sample_annotations.iter().map(|r| r.token.as_str()))
}
