//! Immutable node model for the concurrent hash trie.
//!
//! Everything in this module is immutable once published. The only
//! mutable cell in the whole structure is the indirection node's main
//! pointer, and every structural change is expressed as building a new
//! snapshot from an old one.

use petek::Atomic;
use std::sync::Arc;

/// Bits of hash consumed per trie level.
pub(crate) const W: u32 = 5;

/// Mask extracting one level's index from a hash.
pub(crate) const INDEX_MASK: u64 = 0x1f;

/// Level at which the 64-bit hash is exhausted; keys indistinguishable
/// at this depth fall into a collision list.
pub(crate) const HASH_BITS: u32 = 64;

/// A key/value pair with its cached 64-bit digest. Immutable.
pub(crate) struct Entry<V> {
    pub(crate) key: Box<[u8]>,
    pub(crate) hash: u64,
    pub(crate) value: V,
}

impl<V> Entry<V> {
    pub(crate) fn new(key: &[u8], hash: u64, value: V) -> Self {
        Self {
            key: key.into(),
            hash,
            value,
        }
    }
}

/// One slot of a branch array: either descend through another
/// indirection node or terminate at a leaf entry.
pub(crate) enum Branch<V> {
    Indirection(Arc<INode<V>>),
    Leaf(Arc<Entry<V>>),
}

impl<V> Clone for Branch<V> {
    fn clone(&self) -> Self {
        match self {
            Branch::Indirection(inode) => Branch::Indirection(inode.clone()),
            Branch::Leaf(leaf) => Branch::Leaf(leaf.clone()),
        }
    }
}

/// Bitmap-indexed branch array (C-node).
///
/// Invariant: `bitmap.count_ones() == array.len()`, and branches are
/// ordered by ascending 5-bit index at this node's level.
pub(crate) struct CNode<V> {
    pub(crate) bitmap: u32,
    pub(crate) array: Vec<Branch<V>>,
}

impl<V> CNode<V> {
    pub(crate) fn empty() -> Self {
        Self {
            bitmap: 0,
            array: Vec::new(),
        }
    }

    /// Copy with `branch` inserted at `pos` and `flag` set in the bitmap.
    pub(crate) fn inserted(&self, pos: u32, flag: u32, branch: Branch<V>) -> Self {
        let pos = pos as usize;
        let mut array = Vec::with_capacity(self.array.len() + 1);
        array.extend_from_slice(&self.array[..pos]);
        array.push(branch);
        array.extend_from_slice(&self.array[pos..]);
        Self {
            bitmap: self.bitmap | flag,
            array,
        }
    }

    /// Copy with the branch at `pos` replaced.
    pub(crate) fn updated(&self, pos: u32, branch: Branch<V>) -> Self {
        let mut array = self.array.clone();
        array[pos as usize] = branch;
        Self {
            bitmap: self.bitmap,
            array,
        }
    }

    /// Copy with the branch at `pos` removed and `flag` cleared.
    pub(crate) fn removed(&self, pos: u32, flag: u32) -> Self {
        let pos = pos as usize;
        let mut array = Vec::with_capacity(self.array.len() - 1);
        array.extend_from_slice(&self.array[..pos]);
        array.extend_from_slice(&self.array[pos + 1..]);
        Self {
            bitmap: self.bitmap ^ flag,
            array,
        }
    }
}

impl<V> Clone for CNode<V> {
    fn clone(&self) -> Self {
        Self {
            bitmap: self.bitmap,
            array: self.array.clone(),
        }
    }
}

/// Persistent singly-linked collision list (L-node) for entries whose
/// full 64-bit hashes are identical.
pub(crate) struct LNode<V> {
    pub(crate) leaf: Arc<Entry<V>>,
    pub(crate) next: Option<Arc<LNode<V>>>,
}

impl<V> Clone for LNode<V> {
    fn clone(&self) -> Self {
        Self {
            leaf: self.leaf.clone(),
            next: self.next.clone(),
        }
    }
}

impl<V> LNode<V> {
    pub(crate) fn pair(first: Arc<Entry<V>>, second: Arc<Entry<V>>) -> Self {
        Self {
            leaf: first,
            next: Some(Arc::new(Self {
                leaf: second,
                next: None,
            })),
        }
    }

    /// Rebuild a list from leaves; `leaves` must be non-empty.
    pub(crate) fn from_leaves(leaves: Vec<Arc<Entry<V>>>) -> Self {
        let mut iter = leaves.into_iter().rev();
        let mut node = Self {
            leaf: iter
                .next()
                .unwrap_or_else(|| unreachable!("collision list cannot be empty")),
            next: None,
        };
        for leaf in iter {
            node = Self {
                leaf,
                next: Some(Arc::new(node)),
            };
        }
        node
    }

    /// Find the entry with an exactly matching key.
    pub(crate) fn find(&self, key: &[u8]) -> Option<&Arc<Entry<V>>> {
        let mut node = self;
        loop {
            if *node.leaf.key == *key {
                return Some(&node.leaf);
            }
            match &node.next {
                Some(next) => node = next,
                None => return None,
            }
        }
    }

    /// Collect all leaves in list order.
    pub(crate) fn leaves(&self) -> Vec<Arc<Entry<V>>> {
        let mut out = Vec::new();
        let mut node = self;
        loop {
            out.push(node.leaf.clone());
            match &node.next {
                Some(next) => node = next,
                None => return out,
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        let mut n = 1;
        let mut node = self;
        while let Some(next) = &node.next {
            n += 1;
            node = next;
        }
        n
    }
}

/// Shape of a subtree: exactly one variant is ever active, by
/// construction.
pub(crate) enum MainNode<V> {
    /// Bitmap-indexed branch array.
    Branches(CNode<V>),
    /// Tombed leaf: this subtree degenerated to a single entry at a
    /// non-root level and awaits resurrection into its parent.
    Tomb(Arc<Entry<V>>),
    /// Collision list for fully-equal hashes.
    Collision(LNode<V>),
}

/// Indirection node: the single mutable cell of the trie. Holds one
/// atomically swappable pointer to an immutable main-node snapshot.
pub(crate) struct INode<V> {
    pub(crate) main: Atomic<MainNode<V>>,
}

impl<V> INode<V> {
    pub(crate) fn new(main: MainNode<V>) -> Self {
        Self {
            main: Atomic::new(Box::into_raw(Box::new(main))),
        }
    }
}

impl<V> Drop for INode<V> {
    fn drop(&mut self) {
        // The currently installed main node was never retired; with
        // exclusive access it is freed directly.
        let ptr = self.main.load_raw(petek::Ordering::Relaxed);
        if !ptr.is_null() {
            // SAFETY: Drop gives exclusive access; no guard can still
            // reach this I-node (its owning snapshots passed their
            // grace period before this drop ran).
            unsafe { drop(Box::from_raw(ptr)) };
        }
    }
}

/// Per-level index extraction and branch-array position computation.
///
/// Returns the bitmap flag for the hash's 5-bit index at `lev`, and the
/// branch-array position as the popcount of set bits below the flag.
#[inline]
pub(crate) fn flag_pos(hash: u64, lev: u32, bitmap: u32) -> (u32, u32) {
    let idx = (hash >> lev) & INDEX_MASK;
    let flag = 1u32 << idx;
    let pos = (bitmap & (flag - 1)).count_ones();
    (flag, pos)
}

/// Build the main node separating two leaves whose hashes agree on all
/// levels below `lev`. Recurses one level at a time until the hashes
/// diverge; if the hash bits run out, the leaves share a collision list.
pub(crate) fn expand<V>(x: Arc<Entry<V>>, y: Arc<Entry<V>>, lev: u32) -> MainNode<V> {
    if lev >= HASH_BITS {
        return MainNode::Collision(LNode::pair(x, y));
    }
    let xidx = (x.hash >> lev) & INDEX_MASK;
    let yidx = (y.hash >> lev) & INDEX_MASK;
    let bitmap = (1u32 << xidx) | (1u32 << yidx);
    if xidx == yidx {
        let inner = INode::new(expand(x, y, lev + W));
        MainNode::Branches(CNode {
            bitmap,
            array: vec![Branch::Indirection(Arc::new(inner))],
        })
    } else {
        let (first, second) = if xidx < yidx { (x, y) } else { (y, x) };
        MainNode::Branches(CNode {
            bitmap,
            array: vec![Branch::Leaf(first), Branch::Leaf(second)],
        })
    }
}
