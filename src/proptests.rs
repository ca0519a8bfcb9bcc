use super::*;

use proptest::prelude::*;
use proptest::sample::Index as Pick;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn validate_trie<V>(t: &BTrie<V>) {
    let mut stack: Vec<(NodeId, Vec<usize>)> = vec![(NodeId::ROOT, Vec::new())];
    let mut reachable = 0usize;
    let mut entries = 0usize;
    let mut key_bytes = 0usize;

    while let Some((id, path)) = stack.pop() {
        reachable += 1;
        let node = &t.nodes[id];

        if id != NodeId::ROOT {
            assert!(!node.is_vacant(), "vacant non-root node must have been pruned");
        }

        if let Some(entry) = &node.entry {
            entries += 1;
            key_bytes += entry.key().len();

            let bits = key_bits(entry.key());
            assert!(
                bits >= path.len(),
                "entry hosted below the end of its key ({bits} bits at depth {})",
                path.len()
            );
            for (pos, &bit) in path.iter().enumerate() {
                assert_eq!(bit_at(entry.key(), pos), bit, "path must be a prefix of the hosted key");
            }
            if node.has_children() {
                assert_eq!(bits, path.len(), "an occupant with children must end at its node");
            }
        }

        for bit in 0..2 {
            if let Some(child) = node.children[bit] {
                let mut child_path = path.clone();
                child_path.push(bit);
                stack.push((child, child_path));
            }
        }
    }

    assert_eq!(entries, t.len(), "reachable entry count must match BTrie::len");
    assert_eq!(reachable, t.nodes.live(), "every live slot must be reachable");
    assert_eq!(key_bytes, t.key_bytes, "key byte total must match stored keys");
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A tiny alphabet with 0x00 and 0xFF forces prefixes, trailing zero bytes
    // and long shared bit runs.
    let byte = prop_oneof![
        3 => Just(0x00u8),
        2 => Just(0x01u8),
        2 => Just(0x80u8),
        3 => Just(0xFFu8),
        2 => any::<u8>(),
    ];
    prop::collection::vec(byte, 0..=5)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 45)]
    Insert(#[proptest(strategy = "key_strategy()")] Vec<u8>, u64),
    #[proptest(weight = 10)]
    Put(#[proptest(strategy = "key_strategy()")] Vec<u8>, Option<u64>),
    #[proptest(weight = 25)]
    Remove(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 20)]
    Get(#[proptest(strategy = "key_strategy()")] Vec<u8>),
}

#[derive(Clone, Debug, Arbitrary)]
struct Traversal {
    #[proptest(strategy = "prop::option::of(key_strategy())")]
    from: Option<Vec<u8>>,
    backward: bool,
    subtree_only: bool,
    #[proptest(strategy = "prop::option::of(0usize..8)")]
    limit: Option<usize>,
}

impl Traversal {
    fn opts(&self) -> TraversalOpts {
        let mut opts = TraversalOpts::new();
        if let Some(from) = &self.from {
            opts = opts.from(from);
        }
        if self.backward {
            opts = opts.backward();
        }
        if self.subtree_only {
            opts = opts.subtree_only();
        }
        if let Some(limit) = self.limit {
            opts = opts.limit(limit);
        }
        opts
    }

    fn expected(&self, m: &BTreeMap<Vec<u8>, u64>) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = match &self.from {
            None => m.keys().cloned().collect(),
            Some(from) if self.subtree_only => {
                m.keys().filter(|k| k.starts_with(from)).cloned().collect()
            }
            Some(from) if self.backward => m.range(..=from.clone()).map(|(k, _)| k.clone()).collect(),
            Some(from) => m.range(from.clone()..).map(|(k, _)| k.clone()).collect(),
        };
        if self.backward {
            keys.reverse();
        }
        if let Some(limit) = self.limit {
            keys.truncate(limit);
        }
        keys
    }
}

fn collect_keys(cursor: Cursor<'_, u64>) -> Vec<Vec<u8>> {
    cursor.map(|entry| entry.key().to_vec()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=2000)) {
        let mut t: BTrie<u64> = BTrie::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = t.insert(&key, value);
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Put(key, value) => {
                    let old_t = t.put(&key, value);
                    let old_m = match value {
                        Some(value) => m.insert(key, value),
                        None => m.remove(&key),
                    };
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(key) => {
                    let old_t = t.remove(&key);
                    let old_m = m.remove(key.as_slice());
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Get(key) => {
                    let got_t = t.get(&key).copied();
                    let got_m = m.get(key.as_slice()).copied();
                    prop_assert_eq!(got_t, got_m);
                    prop_assert_eq!(t.contains_key(&key), m.contains_key(key.as_slice()));
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|e| (e.key().to_vec(), *e.value())).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_traversal_matches_btreemap(
        keys in prop::collection::vec(key_strategy(), 0..=64),
        traversals in prop::collection::vec(any::<Traversal>(), 1..=16),
    ) {
        let mut t: BTrie<u64> = BTrie::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for (i, key) in keys.into_iter().enumerate() {
            t.insert(&key, i as u64);
            m.insert(key, i as u64);
        }
        validate_trie(&t);

        for traversal in traversals {
            let got = collect_keys(t.traverse(traversal.opts()));
            prop_assert_eq!(got, traversal.expected(&m), "{:?}", traversal);
        }
    }

    #[test]
    fn prop_seek_continuation(
        keys in prop::collection::btree_set(key_strategy(), 1..=64),
        pick in any::<Pick>(),
    ) {
        let mut t: BTrie<u64> = BTrie::new();
        for (i, key) in keys.iter().enumerate() {
            t.insert(key, i as u64);
        }

        let full = collect_keys(t.traverse_fully());
        let start = pick.index(full.len());
        let seeded = collect_keys(t.traverse(TraversalOpts::new().from(&full[start])));
        prop_assert_eq!(&seeded[..], &full[start..]);

        let mut reversed = collect_keys(t.traverse(TraversalOpts::new().backward()));
        reversed.reverse();
        prop_assert_eq!(&reversed, &full);
    }

    #[test]
    fn prop_limit_is_prefix_of_full(
        keys in prop::collection::vec(key_strategy(), 0..=64),
        limit in 0usize..80,
    ) {
        let mut t: BTrie<u64> = BTrie::new();
        for (i, key) in keys.iter().enumerate() {
            t.insert(key, i as u64);
        }

        let full = collect_keys(t.traverse_fully());
        let limited = collect_keys(t.traverse(TraversalOpts::new().limit(limit)));
        prop_assert_eq!(limited.len(), limit.min(t.len()));
        prop_assert_eq!(&limited[..], &full[..limited.len()]);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_key_set() -> Vec<Vec<u8>> {
    vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"a\x00".to_vec(),
    ]
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = small_key_set();

    for_each_permutation(&keys, |perm| {
        let mut t: BTrie<u64> = BTrie::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as u64;
            assert_eq!(t.insert(&k, v), m.insert(k, v));
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|e| (e.key().to_vec(), *e.value())).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);

        let backward: Vec<Vec<u8>> = collect_keys(t.traverse(TraversalOpts::new().backward()));
        let expected: Vec<Vec<u8>> = m.keys().rev().cloned().collect();
        assert_eq!(backward, expected);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = small_key_set();

    // Insert in a fixed order, then remove in all permutations.
    let mut base_trie: BTrie<u64> = BTrie::new();
    let mut base_map: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as u64;
        assert_eq!(base_trie.insert(k, v), base_map.insert(k.clone(), v));
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base_trie.clone();
        let mut m = base_map.clone();

        for k in perm {
            assert_eq!(t.remove(&k), m.remove(k.as_slice()));
            assert_eq!(t.len(), m.len());
            validate_trie(&t);
        }
        assert!(t.is_empty());
        assert_eq!(t.nodes.live(), 1);
        assert!(t.nodes[NodeId::ROOT].is_vacant());
    });
}
