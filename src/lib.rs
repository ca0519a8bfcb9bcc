//! # btrie
//!
//! An in-memory ordered map over byte keys, stored as a partially compressed
//! binary trie: every branching decision is a single key bit, most significant
//! bit first.
//!
//! Nodes may host an entry *and* have children, so a chain of single-child
//! nodes is only materialized down to the point where two stored keys actually
//! diverge. Interior runs are not merged into multi-bit edges.
//!
//! ## Example
//!
//! ```rust
//! use btrie::{BTrie, TraversalOpts};
//!
//! let mut trie: BTrie<&str> = BTrie::new();
//! trie.insert(b"fall", "Autumn");
//! trie.insert(b"fallout", "Mushroom cloud");
//! trie.insert(b"win", "X");
//! trie.insert(b"winter", "Y");
//!
//! assert_eq!(trie.get(b"fall"), Some(&"Autumn"));
//!
//! let keys: Vec<&[u8]> = trie
//!     .traverse(TraversalOpts::new().from(b"w"))
//!     .map(|entry| entry.key())
//!     .collect();
//! assert_eq!(keys, vec![&b"win"[..], &b"winter"[..]]);
//! ```
//!
//! A [`Cursor`] borrows the trie, so the trie cannot be mutated while a
//! traversal is in progress.

#![forbid(unsafe_code)]

use std::ops::{Index, IndexMut};

mod cursor;

pub use cursor::{Cursor, Direction, TraversalOpts};

use cursor::Frame;

// =============================================================================
// Bit utilities
// =============================================================================

/// Bit `pos` of `key`, where bit 0 is the MSB of byte 0.
#[inline]
fn bit_at(key: &[u8], pos: usize) -> usize {
    debug_assert!(pos < key_bits(key));
    usize::from((key[pos / 8] >> (7 - pos % 8)) & 1)
}

#[inline]
fn key_bits(key: &[u8]) -> usize {
    key.len() * 8
}

// =============================================================================
// Entries
// =============================================================================

/// A key-value pair stored in a [`BTrie`].
///
/// Entries are never mutated in place: updating a key replaces its entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<V> {
    key: Box<[u8]>,
    value: V,
}

impl<V> Entry<V> {
    fn new(key: &[u8], value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn into_parts(self) -> (Box<[u8]>, V) {
        (self.key, self.value)
    }
}

// =============================================================================
// Node arena
// =============================================================================

/// Stable index of a node inside a [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(usize);

impl NodeId {
    const ROOT: NodeId = NodeId(0);
}

#[derive(Clone, Debug)]
struct Node<V> {
    /// Child on bit 0, child on bit 1.
    children: [Option<NodeId>; 2],
    /// Occupant entry. Its key's bit path starts with the path to this node.
    entry: Option<Entry<V>>,
}

impl<V> Node<V> {
    fn vacant() -> Self {
        Self {
            children: [None, None],
            entry: None,
        }
    }

    fn hosting(entry: Option<Entry<V>>) -> Self {
        Self {
            children: [None, None],
            entry,
        }
    }

    #[inline]
    fn has_children(&self) -> bool {
        self.children[0].is_some() || self.children[1].is_some()
    }

    /// No occupant and no children: such a node is pruned unless it is the root.
    #[inline]
    fn is_vacant(&self) -> bool {
        self.entry.is_none() && !self.has_children()
    }
}

/// Owns every node of a trie. Slot 0 is the root and is never freed; other
/// freed slots are recycled by later allocations.
#[derive(Clone, Debug)]
struct NodeArena<V> {
    nodes: Vec<Node<V>>,
    free: Vec<NodeId>,
}

impl<V> NodeArena<V> {
    fn new() -> Self {
        Self {
            nodes: vec![Node::vacant()],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        debug_assert_ne!(id, NodeId::ROOT, "the root node is never freed");
        debug_assert!(self[id].is_vacant(), "only vacant nodes are freed");
        self.free.push(id);
    }

    /// Number of allocated slots, live or free.
    #[cfg(any(test, feature = "tracing"))]
    fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes currently linked into the trie (root included).
    #[cfg(any(test, feature = "tracing"))]
    fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node<V>>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
    }

    fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.free.shrink_to_fit();
    }
}

impl<V> Index<NodeId> for NodeArena<V> {
    type Output = Node<V>;

    #[inline]
    fn index(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.0]
    }
}

impl<V> IndexMut<NodeId> for NodeArena<V> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.0]
    }
}

// =============================================================================
// Drill-down
// =============================================================================

/// What `drill_down` records about the nodes it leaves behind.
enum Trail<'s> {
    None,
    /// Every node left, with the bit taken out of it.
    Ancestors(&'s mut Vec<(NodeId, usize)>),
    /// The frames a cursor needs to continue past the probe in `Direction`.
    Continuation(Direction, &'s mut Vec<Frame>),
}

/// Where a drill-down stopped.
#[derive(Clone, Copy, Debug)]
struct Seek {
    node: NodeId,
    /// Number of key bits consumed to reach `node`.
    depth: usize,
    /// `node` hosts an entry whose key equals the probe.
    exact: bool,
}

/// One step of the insertion walk, decided from the current node's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// A child exists for the bit.
    Descend(NodeId),
    /// Only the opposite child exists; grow a child for the bit.
    Extend,
    /// Nothing here yet; the new entry goes to this node.
    Settle,
    /// The occupant's key ends at this depth; branch off a new child and stop.
    Fork,
    /// The occupant diverges at this bit; move it to its own child and stop.
    Split,
    /// The occupant agrees on this bit; move it one level down and keep going.
    PushDown,
}

// =============================================================================
// BTrie
// =============================================================================

/// An ordered map from byte keys to `V`, backed by a binary trie.
///
/// Keys are ordered byte-lexicographically (a proper prefix sorts first).
/// The map is not internally synchronized; mutation requires `&mut self`.
#[derive(Clone)]
pub struct BTrie<V> {
    nodes: NodeArena<V>,
    len: usize,
    /// Total length of all stored keys.
    key_bytes: usize,
}

impl<V> BTrie<V> {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            len: 0,
            key_bytes: 0,
        }
    }

    /// Number of entries stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Approximate heap bytes held by nodes and stored keys.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage() + self.key_bytes
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Walks `key` bit by bit from the root for as long as a matching child
    /// exists, recording into `trail` as it goes.
    fn drill_down(&self, key: &[u8], mut trail: Trail<'_>) -> Seek {
        let mut current = NodeId::ROOT;
        let mut depth = 0;

        while depth < key_bits(key) {
            let bit = bit_at(key, depth);
            let node = &self.nodes[current];
            let Some(child) = node.children[bit] else {
                break;
            };

            match &mut trail {
                Trail::None => {}
                Trail::Ancestors(path) => path.push((current, bit)),
                Trail::Continuation(direction, stack) => {
                    // An occupant above the probe is a proper prefix of it:
                    // smaller than everything below, so only a descending
                    // cursor still has to visit it, after the subtree.
                    if *direction == Direction::Backward && node.entry.is_some() {
                        stack.push(Frame::Emit(current));
                    }
                    if bit == direction.near_bit() {
                        if let Some(far) = node.children[direction.far_bit()] {
                            stack.push(Frame::Expand(far));
                        }
                    }
                }
            }

            current = child;
            depth += 1;
        }

        let exact = self.nodes[current]
            .entry
            .as_ref()
            .is_some_and(|entry| entry.key() == key);
        Seek {
            node: current,
            depth,
            exact,
        }
    }

    fn classify(&self, current: NodeId, key: &[u8], depth: usize) -> Step {
        let node = &self.nodes[current];
        let bit = bit_at(key, depth);

        if let Some(child) = node.children[bit] {
            return Step::Descend(child);
        }
        if node.children[bit ^ 1].is_some() {
            return Step::Extend;
        }
        let Some(occupant) = &node.entry else {
            return Step::Settle;
        };

        let occupant_bits = key_bits(occupant.key());
        debug_assert!(occupant_bits >= depth);
        if occupant_bits == depth {
            Step::Fork
        } else if bit_at(occupant.key(), depth) != bit {
            Step::Split
        } else {
            Step::PushDown
        }
    }

    /// Links `node` under `parent` on `bit` and returns its id.
    fn attach(&mut self, parent: NodeId, bit: usize, node: Node<V>) -> NodeId {
        debug_assert!(self.nodes[parent].children[bit].is_none());
        let id = self.nodes.alloc(node);
        self.nodes[parent].children[bit] = Some(id);
        id
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let seek = self.drill_down(key, Trail::None);
        if !seek.exact {
            return None;
        }
        self.nodes[seek.node].entry.as_ref().map(Entry::value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.drill_down(key, Trail::None).exact
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let mut current = NodeId::ROOT;

        for depth in 0..key_bits(key) {
            let bit = bit_at(key, depth);
            match self.classify(current, key, depth) {
                Step::Descend(child) => current = child,
                Step::Extend => current = self.attach(current, bit, Node::vacant()),
                Step::Settle => break,
                Step::Fork => {
                    current = self.attach(current, bit, Node::vacant());
                    break;
                }
                Step::Split => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(depth, "splitting occupant off the insertion path");
                    let occupant = self.nodes[current].entry.take();
                    self.attach(current, bit ^ 1, Node::hosting(occupant));
                    current = self.attach(current, bit, Node::vacant());
                    break;
                }
                Step::PushDown => {
                    let occupant = self.nodes[current].entry.take();
                    current = self.attach(current, bit, Node::hosting(occupant));
                }
            }
        }

        let previous = match self.nodes[current].entry.take() {
            Some(occupant) if occupant.key() == key => Some(occupant.into_value()),
            Some(occupant) => {
                // `key` is a strict prefix of the occupant's key and ends here.
                debug_assert!(occupant.key().starts_with(key));
                debug_assert!(!self.nodes[current].has_children());
                let bit = bit_at(occupant.key(), key_bits(key));
                self.attach(current, bit, Node::hosting(Some(occupant)));
                None
            }
            None => None,
        };

        self.nodes[current].entry = Some(Entry::new(key, value));
        if previous.is_none() {
            self.len += 1;
            self.key_bytes += key.len();
        }
        previous
    }

    /// Stores `value` under `key`; `None` removes the key instead.
    pub fn put(&mut self, key: &[u8], value: Option<V>) -> Option<V> {
        match value {
            Some(value) => self.insert(key, value),
            None => self.remove(key),
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let mut ancestors = Vec::with_capacity(key_bits(key));
        let seek = self.drill_down(key, Trail::Ancestors(&mut ancestors));
        if !seek.exact {
            return None;
        }

        let old = self.nodes[seek.node].entry.take()?.into_value();
        self.len -= 1;
        self.key_bytes -= key.len();
        self.prune(seek.node, ancestors);
        Some(old)
    }

    /// Detaches vacant nodes from `node` upwards, stopping at the first node
    /// that still holds something. The root is never detached.
    fn prune(&mut self, mut node: NodeId, mut ancestors: Vec<(NodeId, usize)>) {
        while let Some((parent, bit)) = ancestors.pop() {
            if !self.nodes[node].is_vacant() {
                break;
            }
            debug_assert_eq!(self.nodes[parent].children[bit], Some(node));
            self.nodes[parent].children[bit] = None;
            self.nodes.free_node(node);
            node = parent;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            live_nodes = self.nodes.live(),
            free_slots = self.nodes.slots() - self.nodes.live(),
            "pruned after removal"
        );
    }

    /// Starts a traversal configured by `opts`.
    pub fn traverse(&self, opts: TraversalOpts) -> Cursor<'_, V> {
        Cursor::new(self, opts)
    }

    /// Ascending traversal over every entry.
    pub fn traverse_fully(&self) -> Cursor<'_, V> {
        self.traverse(TraversalOpts::default())
    }

    pub fn iter(&self) -> Cursor<'_, V> {
        self.traverse_fully()
    }

    // =========================================================================
    // Text keys
    // =========================================================================

    pub fn put_str(&mut self, key: &str, value: Option<V>) -> Option<V> {
        self.put(key.as_bytes(), value)
    }

    pub fn get_str(&self, key: &str) -> Option<&V> {
        self.get(key.as_bytes())
    }

    pub fn remove_str(&mut self, key: &str) -> Option<V> {
        self.remove(key.as_bytes())
    }
}

impl<V> Default for BTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for BTrie<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|entry| (entry.key(), entry.value())))
            .finish()
    }
}

impl<'a, V> IntoIterator for &'a BTrie<V> {
    type Item = &'a Entry<V>;
    type IntoIter = Cursor<'a, V>;

    fn into_iter(self) -> Cursor<'a, V> {
        self.iter()
    }
}


#[cfg(test)]
mod proptests;
