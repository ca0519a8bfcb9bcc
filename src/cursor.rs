use std::iter::FusedIterator;

use crate::{bit_at, key_bits, BTrie, Entry, NodeId, Trail};

/// Order in which a traversal visits keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Lowest to highest key.
    #[default]
    Forward,
    /// Highest to lowest key.
    Backward,
}

impl Direction {
    /// The child visited first below any node.
    #[inline]
    pub(crate) fn near_bit(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Backward => 1,
        }
    }

    #[inline]
    pub(crate) fn far_bit(self) -> usize {
        self.near_bit() ^ 1
    }

    /// Whether `key` is reached at or after `bound` when walking this way.
    #[inline]
    fn admits(self, key: &[u8], bound: &[u8]) -> bool {
        match self {
            Direction::Forward => key >= bound,
            Direction::Backward => key <= bound,
        }
    }
}

/// Options for [`BTrie::traverse`].
///
/// ```rust
/// use btrie::{BTrie, TraversalOpts};
///
/// let mut trie: BTrie<u32> = BTrie::new();
/// for (i, word) in ["apple", "apricot", "banana"].iter().enumerate() {
///     trie.insert(word.as_bytes(), i as u32);
/// }
///
/// let opts = TraversalOpts::new().from(b"ap").subtree_only().backward();
/// let values: Vec<u32> = trie.traverse(opts).map(|e| *e.value()).collect();
/// assert_eq!(values, vec![1, 0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalOpts {
    pub direction: Direction,
    /// Key to start from, whether or not it is stored. `None` covers the whole trie.
    pub from: Option<Vec<u8>>,
    /// Only visit keys that start with `from`. Ignored without `from`.
    pub subtree_only: bool,
    /// Maximum number of entries to yield. `None` is unlimited.
    pub limit: Option<usize>,
}

impl TraversalOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn backward(self) -> Self {
        self.direction(Direction::Backward)
    }

    pub fn from(mut self, key: impl AsRef<[u8]>) -> Self {
        self.from = Some(key.as_ref().to_vec());
        self
    }

    pub fn subtree_only(mut self) -> Self {
        self.subtree_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Pending work on a cursor's backtracking stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Visit the node and everything below it.
    Expand(NodeId),
    /// Yield the node's occupant only.
    Emit(NodeId),
}

/// A pull-based traversal over a [`BTrie`], created by [`BTrie::traverse`].
///
/// Entries come out strictly ascending ([`Direction::Forward`]) or strictly
/// descending ([`Direction::Backward`]) by key. The cursor holds a shared
/// borrow of the trie, so the trie cannot change underneath it.
///
/// Besides [`Iterator::next`], the cursor supports a `has_next` / `next`
/// polling style: [`Cursor::has_next`] finds the next entry and holds it until
/// `next` takes it.
pub struct Cursor<'a, V> {
    trie: &'a BTrie<V>,
    stack: Vec<Frame>,
    direction: Direction,
    remaining: Option<usize>,
    found: Option<&'a Entry<V>>,
}

impl<'a, V> Cursor<'a, V> {
    pub(crate) fn new(trie: &'a BTrie<V>, opts: TraversalOpts) -> Self {
        let TraversalOpts {
            direction,
            from,
            subtree_only,
            limit,
        } = opts;

        let mut stack = Vec::with_capacity(16);
        match from.as_deref() {
            None => stack.push(Frame::Expand(NodeId::ROOT)),
            Some(from) if subtree_only => seed_subtree(trie, from, &mut stack),
            Some(from) => seed_continuation(trie, from, direction, &mut stack),
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(?direction, subtree_only, seeded = stack.len(), "cursor seeded");

        Self {
            trie,
            stack,
            direction,
            remaining: limit,
            found: None,
        }
    }

    /// Returns whether another entry is available, finding it if necessary.
    pub fn has_next(&mut self) -> bool {
        if self.found.is_none() {
            self.found = self.advance();
        }
        self.found.is_some()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    fn advance(&mut self) -> Option<&'a Entry<V>> {
        if self.remaining == Some(0) {
            return None;
        }

        let trie = self.trie;
        let post_order = self.direction == Direction::Backward;
        while let Some(frame) = self.stack.pop() {
            let entry = match frame {
                Frame::Emit(id) => trie.nodes[id].entry.as_ref(),
                Frame::Expand(id) => {
                    let node = &trie.nodes[id];
                    // A node's occupant is a prefix of every key below it.
                    if post_order && node.entry.is_some() {
                        self.stack.push(Frame::Emit(id));
                    }
                    for bit in [self.direction.far_bit(), self.direction.near_bit()] {
                        if let Some(child) = node.children[bit] {
                            self.stack.push(Frame::Expand(child));
                        }
                    }
                    if post_order {
                        None
                    } else {
                        node.entry.as_ref()
                    }
                }
            };

            if let Some(entry) = entry {
                if let Some(remaining) = &mut self.remaining {
                    *remaining -= 1;
                }
                return Some(entry);
            }
        }
        None
    }
}

/// Seeds `stack` so that walking it yields exactly the keys on the far side
/// of `from`, in `direction`.
fn seed_continuation<V>(trie: &BTrie<V>, from: &[u8], direction: Direction, stack: &mut Vec<Frame>) {
    let seek = trie.drill_down(from, Trail::Continuation(direction, &mut *stack));
    let node = &trie.nodes[seek.node];
    let occupant_admitted = node
        .entry
        .as_ref()
        .is_some_and(|entry| direction.admits(entry.key(), from));

    if seek.depth == key_bits(from) {
        // Everything below starts with `from`.
        match direction {
            Direction::Forward => stack.push(Frame::Expand(seek.node)),
            Direction::Backward if occupant_admitted => stack.push(Frame::Emit(seek.node)),
            Direction::Backward => {}
        }
        return;
    }

    // The walk stopped because the child for `missing` does not exist. The
    // other child is entirely before or entirely after `from`.
    let missing = bit_at(from, seek.depth);
    let beyond = if missing == direction.near_bit() {
        node.children[direction.far_bit()]
    } else {
        None
    };

    match direction {
        Direction::Forward => {
            stack.extend(beyond.map(Frame::Expand));
            if occupant_admitted {
                stack.push(Frame::Emit(seek.node));
            }
        }
        Direction::Backward => {
            if occupant_admitted {
                stack.push(Frame::Emit(seek.node));
            }
            stack.extend(beyond.map(Frame::Expand));
        }
    }
}

/// Seeds `stack` with the entries whose keys start with `prefix`.
fn seed_subtree<V>(trie: &BTrie<V>, prefix: &[u8], stack: &mut Vec<Frame>) {
    let seek = trie.drill_down(prefix, Trail::None);
    if seek.depth == key_bits(prefix) {
        stack.push(Frame::Expand(seek.node));
    } else if trie.nodes[seek.node]
        .entry
        .as_ref()
        .is_some_and(|entry| entry.key().starts_with(prefix))
    {
        // Compressed: the only key under the prefix sits above its full path.
        stack.push(Frame::Emit(seek.node));
    }
}

impl<'a, V> Iterator for Cursor<'a, V> {
    type Item = &'a Entry<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.found.take().or_else(|| self.advance())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let found = usize::from(self.found.is_some());
        let rest = match self.remaining {
            Some(remaining) => remaining.min(self.trie.len()),
            None => self.trie.len(),
        };
        (found, Some(found + rest))
    }
}

impl<V> FusedIterator for Cursor<'_, V> {}
