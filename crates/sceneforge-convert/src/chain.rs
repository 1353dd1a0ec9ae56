//! Chain linker
//!
//! Records live in flat arrays for bulk serialization but consumers walk
//! them as doubly linked lists through the `prev`/`next` token fields. The
//! linker is the single second pass that fills those fields: first element
//! gets an empty `prev`, last an empty `next`, every interior pair points at
//! each other.

use sceneforge_schema::Chainable;

/// Thread a sequence that is already stored in chain order.
pub fn link_chain<T: Chainable>(records: &mut [T]) {
    let order: Vec<usize> = (0..records.len()).collect();
    link_by_order(records, &order);
}

/// Thread a chain through `records` following `order`, a permutation of
/// indices (e.g. annotation indices sorted by frame). Only the listed
/// records are touched.
pub fn link_by_order<T: Chainable>(records: &mut [T], order: &[usize]) {
    let tokens: Vec<String> = order.iter().map(|&i| records[i].token().to_string()).collect();
    for (pos, &i) in order.iter().enumerate() {
        let prev = if pos == 0 {
            String::new()
        } else {
            tokens[pos - 1].clone()
        };
        let next = if pos + 1 == order.len() {
            String::new()
        } else {
            tokens[pos + 1].clone()
        };
        records[i].set_prev(prev);
        records[i].set_next(next);
    }
}

/// First position where a timestamp decreases, if any. The chain is still
/// built in array order; the caller records the inconsistency.
pub fn check_monotonic(timestamps: &[u64]) -> Option<usize> {
    timestamps
        .windows(2)
        .position(|pair| pair[1] < pair[0])
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_schema::SampleRecord;

    fn sample(token: &str) -> SampleRecord {
        SampleRecord {
            token: token.to_string(),
            timestamp: 0,
            prev: "stale".to_string(),
            next: "stale".to_string(),
            scene_token: "scene".to_string(),
        }
    }

    #[test]
    fn links_interior_pairs_symmetrically() {
        let mut records = vec![sample("a"), sample("b"), sample("c")];
        link_chain(&mut records);

        assert_eq!(records[0].prev, "");
        assert_eq!(records[0].next, "b");
        assert_eq!(records[1].prev, "a");
        assert_eq!(records[1].next, "c");
        assert_eq!(records[2].prev, "b");
        assert_eq!(records[2].next, "");
    }

    #[test]
    fn single_record_chain_has_empty_ends() {
        let mut records = vec![sample("only")];
        link_chain(&mut records);
        assert_eq!(records[0].prev, "");
        assert_eq!(records[0].next, "");
    }

    #[test]
    fn empty_chain_is_a_noop() {
        let mut records: Vec<SampleRecord> = Vec::new();
        link_chain(&mut records);
    }

    #[test]
    fn link_by_order_follows_the_permutation() {
        // Array order a, b, c but logical order a -> c -> b.
        let mut records = vec![sample("a"), sample("b"), sample("c")];
        link_by_order(&mut records, &[0, 2, 1]);

        assert_eq!(records[0].next, "c");
        assert_eq!(records[2].prev, "a");
        assert_eq!(records[2].next, "b");
        assert_eq!(records[1].prev, "c");
        assert_eq!(records[1].next, "");
    }

    #[test]
    fn monotonic_check_reports_first_regression() {
        assert_eq!(check_monotonic(&[1, 2, 2, 3]), None);
        assert_eq!(check_monotonic(&[1, 3, 2, 4]), Some(2));
        assert_eq!(check_monotonic(&[]), None);
        assert_eq!(check_monotonic(&[7]), None);
    }
}
