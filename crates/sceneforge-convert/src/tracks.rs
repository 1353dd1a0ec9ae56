//! Track aggregator
//!
//! Partitions annotation rows by track identity, threads each partition's
//! chain in frame order, and emits one instance row per track. Annotations
//! without a track identity all land in one synthetic default track.

use crate::chain;
use crate::generate::AnnotationBatch;
use sceneforge_schema::InstanceRecord;
use sceneforge_tokens::{TokenKey, TokenRegistry};
use std::collections::HashMap;

/// Track name for annotations the source left unassigned.
pub const UNTRACKED: &str = "untracked";

/// Group a scene's annotations by track, fill their `instance_token` and
/// link fields, and return the instance table.
///
/// The resolved frame index is the ordering key within a partition. Two
/// annotations sharing a frame keep their source-array order (stable sort).
/// Instance category comes from the partition's first annotation in that
/// order.
pub fn aggregate_tracks(
    registry: &mut TokenRegistry,
    scene: u32,
    batch: &mut AnnotationBatch,
) -> Vec<InstanceRecord> {
    debug_assert_eq!(batch.records.len(), batch.frames.len());
    debug_assert_eq!(batch.records.len(), batch.tracks.len());

    // Partitions in first-appearance order so output is deterministic.
    let mut partition_of: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<(&str, Vec<usize>)> = Vec::new();
    for (index, track) in batch.tracks.iter().enumerate() {
        let track = track.as_deref().unwrap_or(UNTRACKED);
        let slot = *partition_of.entry(track).or_insert_with(|| {
            partitions.push((track, Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(index);
    }

    let mut instances = Vec::with_capacity(partitions.len());
    for (track, mut order) in partitions {
        order.sort_by_key(|&i| batch.frames[i]);

        let instance_token = registry.get(&TokenKey::Instance {
            scene,
            track: track.to_string(),
        });
        for &i in &order {
            batch.records[i].instance_token = instance_token.clone();
        }
        chain::link_by_order(&mut batch.records, &order);

        let first = order[0];
        let last = order[order.len() - 1];
        instances.push(InstanceRecord {
            token: instance_token,
            category_token: batch.records[first].category_token.clone(),
            nbr_annotations: order.len(),
            first_annotation_token: batch.records[first].token.clone(),
            last_annotation_token: batch.records[last].token.clone(),
        });
    }
    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_schema::SampleAnnotationRecord;

    fn annotation(token: &str) -> SampleAnnotationRecord {
        SampleAnnotationRecord {
            token: token.to_string(),
            sample_token: String::new(),
            instance_token: String::new(),
            category_token: "cat".to_string(),
            visibility_token: "4".to_string(),
            attribute_tokens: vec![],
            translation: [0.0; 3],
            size: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            prev: String::new(),
            next: String::new(),
            num_lidar_pts: 0,
            num_radar_pts: 0,
        }
    }

    fn batch(entries: &[(&str, Option<&str>, usize)]) -> AnnotationBatch {
        AnnotationBatch {
            records: entries.iter().map(|(t, _, _)| annotation(t)).collect(),
            frames: entries.iter().map(|&(_, _, f)| f).collect(),
            tracks: entries
                .iter()
                .map(|(_, track, _)| track.map(str::to_string))
                .collect(),
        }
    }

    #[test]
    fn orders_chains_by_frame_not_array_position() {
        // T1 arrives as frames 0, 2, 1, 3; T2 as frames 0, 1.
        let mut batch = batch(&[
            ("a0", Some("T1"), 0),
            ("a1", Some("T1"), 2),
            ("a2", Some("T1"), 1),
            ("a3", Some("T1"), 3),
            ("b0", Some("T2"), 0),
            ("b1", Some("T2"), 1),
        ]);
        let mut registry = TokenRegistry::new();
        let instances = aggregate_tracks(&mut registry, 0, &mut batch);

        assert_eq!(instances.len(), 2);
        let t1 = &instances[0];
        assert_eq!(t1.nbr_annotations, 4);
        assert_eq!(t1.first_annotation_token, "a0");
        assert_eq!(t1.last_annotation_token, "a3");

        // Chain runs 0 -> 1 -> 2 -> 3 by frame: a0, a2, a1, a3.
        assert_eq!(batch.records[0].next, "a2");
        assert_eq!(batch.records[2].prev, "a0");
        assert_eq!(batch.records[2].next, "a1");
        assert_eq!(batch.records[1].prev, "a2");
        assert_eq!(batch.records[1].next, "a3");
        assert_eq!(batch.records[3].prev, "a1");
        assert_eq!(batch.records[3].next, "");

        let t2 = &instances[1];
        assert_eq!(t2.nbr_annotations, 2);
        assert_eq!(batch.records[4].next, "b1");
        assert_eq!(batch.records[5].prev, "b0");

        // Chains never cross tracks.
        assert_ne!(batch.records[3].next, "b0");
    }

    #[test]
    fn untracked_annotations_share_one_synthetic_instance() {
        let mut batch = batch(&[("a", None, 0), ("b", Some("T1"), 0), ("c", None, 1)]);
        let mut registry = TokenRegistry::new();
        let instances = aggregate_tracks(&mut registry, 0, &mut batch);

        assert_eq!(instances.len(), 2);
        assert_eq!(batch.records[0].instance_token, batch.records[2].instance_token);
        assert_ne!(batch.records[0].instance_token, batch.records[1].instance_token);
        assert_eq!(batch.records[0].next, "c");
    }

    #[test]
    fn same_frame_ties_keep_source_order() {
        let mut batch = batch(&[("x", Some("T"), 5), ("y", Some("T"), 5)]);
        let mut registry = TokenRegistry::new();
        let instances = aggregate_tracks(&mut registry, 0, &mut batch);

        assert_eq!(instances[0].first_annotation_token, "x");
        assert_eq!(instances[0].last_annotation_token, "y");
        assert_eq!(batch.records[0].next, "y");
    }

    #[test]
    fn count_matches_partition_size() {
        let mut batch = batch(&[
            ("a", Some("T1"), 0),
            ("b", Some("T2"), 0),
            ("c", Some("T1"), 1),
            ("d", Some("T1"), 2),
        ]);
        let mut registry = TokenRegistry::new();
        let instances = aggregate_tracks(&mut registry, 0, &mut batch);
        let by_count: Vec<usize> = instances.iter().map(|i| i.nbr_annotations).collect();
        assert_eq!(by_count, vec![3, 1]);
    }
}
