//! Sparse Merkle Map
//!
//! Depth-256 sparse Merkle tree using SHA-256, keyed by [`LedgerKey`].
//! Every key is present: an unset key holds value 0, and the empty-leaf hash
//! is the hash of value 0. A first deposit therefore proves `0` against the
//! empty root.
//!
//! [`MerkleMap`] is the client-side structure that materialises the map and
//! hands out witnesses. The protocol itself only ever sees [`MerkleWitness`].

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::core::account::LedgerKey;
use crate::core::hash::Hash256;

/// Tree depth (one level per key bit).
pub const MAP_DEPTH: usize = 256;

/// Domain separator for Merkle map leaf nodes.
const MERKLE_LEAF_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_MERKLE_LEAF_V1";

/// Domain separator for Merkle map internal nodes.
const MERKLE_NODE_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_MERKLE_NODE_V1";

/// Root hash of empty subtrees, indexed by height (0 = leaf).
fn empty_hashes() -> &'static [Hash256] {
    static EMPTY: OnceLock<Vec<Hash256>> = OnceLock::new();
    EMPTY.get_or_init(|| {
        let mut levels = Vec::with_capacity(MAP_DEPTH + 1);
        let mut current = hash_leaf(0);
        levels.push(current);
        for _ in 0..MAP_DEPTH {
            current = hash_nodes(&current, &current);
            levels.push(current);
        }
        levels
    })
}

/// Root of the map in which every key holds 0.
pub fn empty_root() -> Hash256 {
    empty_hashes()[MAP_DEPTH]
}

/// One step of a witness path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessNode {
    /// Hash of the sibling subtree at this height.
    pub sibling: Hash256,
    /// Whether the path node is the left child at this height.
    pub is_left: bool,
}

/// Membership witness for one key.
///
/// Path runs from the leaf (height 0) up to the child of the root. The
/// direction bits encode the key, so a witness proves both the value and
/// the key it sits under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleWitness {
    /// Sibling path, leaf first.
    pub path: Vec<WitnessNode>,
}

impl MerkleWitness {
    /// Recompute the root and key implied by placing `value` at this path.
    pub fn compute_root_and_key(&self, value: u64) -> (Hash256, LedgerKey) {
        let mut current = hash_leaf(value);
        let mut key = [0u8; 32];

        for (height, node) in self.path.iter().enumerate() {
            if node.is_left {
                current = hash_nodes(&current, &node.sibling);
            } else {
                current = hash_nodes(&node.sibling, &current);
                if let Some(depth) = MAP_DEPTH.checked_sub(height + 1) {
                    set_bit(&mut key, depth);
                }
            }
        }

        (current, key)
    }

    /// Whether the path has the full tree depth.
    pub fn is_well_formed(&self) -> bool {
        self.path.len() == MAP_DEPTH
    }

    /// Number of siblings that are not empty-subtree hashes.
    pub fn populated_siblings(&self) -> usize {
        let empty = empty_hashes();
        self.path
            .iter()
            .enumerate()
            .filter(|(height, node)| node.sibling != empty[*height])
            .count()
    }
}

/// Materialised sparse Merkle map.
///
/// Stores only non-empty nodes. Each update rewrites the 256 nodes on the
/// key's path.
#[derive(Clone, Debug, Default)]
pub struct MerkleMap {
    /// Current values (keys holding 0 are absent).
    values: BTreeMap<LedgerKey, u64>,
    /// Non-empty nodes keyed by (height, key prefix).
    nodes: HashMap<(usize, Hash256), Hash256>,
}

impl MerkleMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored at `key` (0 if unset).
    pub fn get(&self, key: &LedgerKey) -> u64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    /// Number of keys holding a non-zero value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether every key holds 0.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current root.
    pub fn root(&self) -> Hash256 {
        self.node(MAP_DEPTH, &[0u8; 32])
    }

    /// Write `value` at `key`.
    pub fn set(&mut self, key: LedgerKey, value: u64) {
        if value == 0 {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }

        let mut current = hash_leaf(value);
        self.store(0, key, current);

        for height in 0..MAP_DEPTH {
            let depth = MAP_DEPTH - height - 1;
            let sibling_prefix = flip_bit(&prefix(&key, depth + 1), depth);
            let sibling = self.node(height, &sibling_prefix);

            current = if get_bit(&key, depth) {
                hash_nodes(&sibling, &current)
            } else {
                hash_nodes(&current, &sibling)
            };

            self.store(height + 1, prefix(&key, depth), current);
        }
    }

    /// Witness for the current value at `key`.
    pub fn witness(&self, key: &LedgerKey) -> MerkleWitness {
        let path = (0..MAP_DEPTH)
            .map(|height| {
                let depth = MAP_DEPTH - height - 1;
                let sibling_prefix = flip_bit(&prefix(key, depth + 1), depth);
                WitnessNode {
                    sibling: self.node(height, &sibling_prefix),
                    is_left: !get_bit(key, depth),
                }
            })
            .collect();

        MerkleWitness { path }
    }

    fn node(&self, height: usize, prefix: &Hash256) -> Hash256 {
        self.nodes
            .get(&(height, *prefix))
            .copied()
            .unwrap_or(empty_hashes()[height])
    }

    fn store(&mut self, height: usize, prefix: Hash256, hash: Hash256) {
        if hash == empty_hashes()[height] {
            self.nodes.remove(&(height, prefix));
        } else {
            self.nodes.insert((height, prefix), hash);
        }
    }
}

/// Bit of `key` at `depth` (0 = most significant, taken at the root).
#[inline]
pub fn get_bit(key: &Hash256, depth: usize) -> bool {
    (key[depth / 8] >> (7 - depth % 8)) & 1 == 1
}

#[inline]
fn set_bit(key: &mut Hash256, depth: usize) {
    key[depth / 8] |= 1 << (7 - depth % 8);
}

#[inline]
fn flip_bit(key: &Hash256, depth: usize) -> Hash256 {
    let mut out = *key;
    out[depth / 8] ^= 1 << (7 - depth % 8);
    out
}

/// Keep the first `bits` bits of `key`, zero the rest.
fn prefix(key: &Hash256, bits: usize) -> Hash256 {
    let mut out = [0u8; 32];
    let full = bits / 8;
    out[..full].copy_from_slice(&key[..full]);
    if bits % 8 != 0 {
        let mask = 0xFFu8 << (8 - bits % 8);
        out[full] = key[full] & mask;
    }
    out
}

/// Hash a leaf value with domain separation.
fn hash_leaf(value: u64) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(MERKLE_LEAF_DOMAIN);
    hasher.update(value.to_le_bytes());
    hasher.finalize().into()
}

/// Hash two child nodes with domain separation.
fn hash_nodes(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(MERKLE_NODE_DOMAIN);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> LedgerKey {
        crate::core::hash::hash_with_domain(b"test-key", &[byte])
    }

    #[test]
    fn test_empty_map_root() {
        let map = MerkleMap::new();
        assert_eq!(map.root(), empty_root());
        assert!(map.is_empty());
    }

    #[test]
    fn test_set_changes_root() {
        let mut map = MerkleMap::new();
        map.set(key(1), 10);
        assert_ne!(map.root(), empty_root());
        assert_eq!(map.get(&key(1)), 10);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_setting_zero_restores_empty_root() {
        let mut map = MerkleMap::new();
        map.set(key(1), 10);
        map.set(key(1), 0);
        assert_eq!(map.root(), empty_root());
        assert!(map.is_empty());
    }

    #[test]
    fn test_root_independent_of_insertion_order() {
        let mut a = MerkleMap::new();
        a.set(key(1), 10);
        a.set(key(2), 20);

        let mut b = MerkleMap::new();
        b.set(key(2), 20);
        b.set(key(1), 10);

        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_witness_reconstructs_root_and_key() {
        let mut map = MerkleMap::new();
        map.set(key(1), 10);
        map.set(key(2), 20);
        map.set(key(3), 30);

        for (k, v) in [(key(1), 10), (key(2), 20), (key(3), 30), (key(4), 0)] {
            let witness = map.witness(&k);
            assert!(witness.is_well_formed());
            let (root, derived_key) = witness.compute_root_and_key(v);
            assert_eq!(root, map.root());
            assert_eq!(derived_key, k);
        }
    }

    #[test]
    fn test_witness_wrong_value_gives_wrong_root() {
        let mut map = MerkleMap::new();
        map.set(key(1), 10);

        let (root, _) = map.witness(&key(1)).compute_root_and_key(11);
        assert_ne!(root, map.root());
    }

    #[test]
    fn test_witness_predicts_updated_root() {
        let mut map = MerkleMap::new();
        map.set(key(1), 10);
        map.set(key(2), 20);

        let witness = map.witness(&key(1));
        let (predicted, _) = witness.compute_root_and_key(99);

        map.set(key(1), 99);
        assert_eq!(predicted, map.root());
    }

    #[test]
    fn test_empty_map_witness_is_all_empty_siblings() {
        let map = MerkleMap::new();
        let witness = map.witness(&key(7));
        assert_eq!(witness.populated_siblings(), 0);

        let mut map = MerkleMap::new();
        map.set(key(8), 1);
        assert_eq!(map.witness(&key(7)).populated_siblings(), 1);
    }

    #[test]
    fn test_bit_helpers() {
        let mut k = [0u8; 32];
        set_bit(&mut k, 0);
        set_bit(&mut k, 255);
        assert!(get_bit(&k, 0));
        assert!(get_bit(&k, 255));
        assert!(!get_bit(&k, 1));
        assert_eq!(k[0], 0x80);
        assert_eq!(k[31], 0x01);

        let p = prefix(&[0xFF; 32], 12);
        assert_eq!(p[0], 0xFF);
        assert_eq!(p[1], 0xF0);
        assert_eq!(p[2], 0x00);
    }
}
