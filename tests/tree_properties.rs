//! Property tests for the in-memory tree and its packed form.
//!
//! Each case builds a tree from shuffled unique keys and checks it against
//! a `BTreeMap` model, before and after packing.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rofldb::tree::Node;
use rofldb::{pack_sorted, BPlusTree, CompareOp, DbReader, NodeId};

type Pairs = Vec<(Vec<u8>, Vec<u8>)>;

fn pairs_strategy(max_len: usize) -> impl Strategy<Value = Pairs> {
    prop::collection::btree_map(
        prop::collection::vec(any::<u8>(), 0..10),
        prop::collection::vec(any::<u8>(), 0..16),
        0..max_len,
    )
    .prop_map(|map| map.into_iter().collect::<Pairs>())
    .prop_shuffle()
}

fn build(pairs: &Pairs, branching_factor: usize) -> BPlusTree {
    let mut tree = BPlusTree::with_branching_factor(branching_factor).unwrap();
    for (key, value) in pairs {
        tree.insert(key.clone(), value.clone());
    }
    tree
}

fn model(pairs: &Pairs) -> BTreeMap<Vec<u8>, Vec<u8>> {
    pairs.iter().cloned().collect()
}

/// Smallest key under `node_id`: the first key of its leftmost leaf.
fn subtree_min(tree: &BPlusTree, mut node_id: NodeId) -> Option<&[u8]> {
    loop {
        match tree.node(node_id) {
            Node::Branch(branch) => node_id = branch.children[0],
            Node::Leaf(leaf) => return leaf.keys.first().map(Vec::as_slice),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_leaf_chain_is_sorted(pairs in pairs_strategy(300), b in 3usize..12) {
        let tree = build(&pairs, b);
        let keys: Vec<&[u8]> = tree.keys().collect();

        prop_assert_eq!(keys.len(), pairs.len());
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_split_occupancy(pairs in pairs_strategy(300), b in 3usize..12) {
        let tree = build(&pairs, b);
        let min = tree.min_occupancy();

        for level in tree.levels() {
            for node_id in level {
                if node_id == tree.root() {
                    continue;
                }
                let entries = match tree.node(node_id) {
                    Node::Leaf(leaf) => leaf.keys.len(),
                    Node::Branch(branch) => branch.children.len(),
                };
                prop_assert!(entries >= min, "{} holds {} < {}", node_id, entries, min);
                prop_assert!(entries <= b);
            }
        }
    }

    #[test]
    fn test_separator_is_right_subtree_min(pairs in pairs_strategy(120), b in 3usize..10) {
        let mut tree = BPlusTree::with_branching_factor(b).unwrap();
        for (key, value) in &pairs {
            tree.insert(key.clone(), value.clone());

            for level in tree.levels() {
                for node_id in level {
                    let Node::Branch(branch) = tree.node(node_id) else {
                        continue;
                    };
                    for (index, separator) in branch.keys.iter().enumerate() {
                        let right_min = subtree_min(&tree, branch.children[index + 1]);
                        prop_assert_eq!(
                            Some(separator.as_slice()),
                            right_min,
                            "{} separator {}",
                            node_id,
                            index
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_range_matches_model(
        pairs in pairs_strategy(200),
        b in 3usize..8,
        probe in prop::collection::vec(any::<u8>(), 0..10),
    ) {
        let tree = build(&pairs, b);
        let model = model(&pairs);

        for op in CompareOp::ALL {
            let expected: Vec<&[u8]> = model
                .iter()
                .filter(|(key, _)| op.matches(key, &probe))
                .map(|(_, value)| value.as_slice())
                .collect();
            prop_assert_eq!(tree.range(op, &probe), expected, "op {}", op);
        }
    }

    #[test]
    fn test_packed_round_trip(pairs in pairs_strategy(300), b in 3usize..12) {
        let tree = build(&pairs, b);
        let packed = tree.pack().unwrap();
        let reader = DbReader::new(packed.as_bytes()).unwrap();

        for (key, value) in &pairs {
            prop_assert_eq!(reader.get(key).unwrap(), Some(value.as_slice()));
        }

        let entries: Vec<(Vec<u8>, Vec<u8>)> = reader
            .entries()
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect::<rofldb::Result<_>>()
            .unwrap();
        let expected: Pairs = model(&pairs).into_iter().collect();
        prop_assert_eq!(entries, expected);
    }

    #[test]
    fn test_absent_keys_miss(
        pairs in pairs_strategy(200),
        b in 3usize..8,
        probe in prop::collection::vec(any::<u8>(), 0..10),
    ) {
        let tree = build(&pairs, b);
        let packed = tree.pack().unwrap();
        let reader = packed.reader().unwrap();

        let model = model(&pairs);
        let expected = model.get(&probe).map(Vec::as_slice);
        prop_assert_eq!(reader.get(&probe).unwrap(), expected);
    }

    #[test]
    fn test_every_pointer_resolves(pairs in pairs_strategy(300), b in 3usize..12) {
        let tree = build(&pairs, b);
        let packed = tree.pack().unwrap();
        let summary = packed.reader().unwrap().verify().unwrap();

        prop_assert_eq!(summary.node_count(), tree.node_count());
        prop_assert_eq!(summary.entry_count, pairs.len());
        prop_assert_eq!(summary.height, tree.height());
        prop_assert_eq!(packed.node_count(), tree.node_count());
    }

    #[test]
    fn test_packing_is_deterministic(pairs in pairs_strategy(200), b in 3usize..12) {
        let first = build(&pairs, b).pack().unwrap();
        let second = build(&pairs, b).pack().unwrap();

        prop_assert_eq!(first.checksum(), second.checksum());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_pack_sorted_matches_sorted_inserts(pairs in pairs_strategy(200), b in 3usize..12) {
        let sorted: Pairs = model(&pairs).into_iter().collect();
        let bulk = pack_sorted(sorted.clone(), b).unwrap();
        let incremental = build(&sorted, b).pack().unwrap();

        prop_assert_eq!(bulk, incremental);
    }
}
