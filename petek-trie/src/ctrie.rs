//! Lock-free concurrent hash trie.
//!
//! # Architecture
//!
//! - **I-nodes**: atomically swappable pointers to immutable snapshots,
//!   the only mutable cells in the structure.
//! - **Snapshots**: bitmap-indexed branch arrays, tombed leaves, or
//!   collision lists; every structural change builds a new snapshot and
//!   publishes it with a single CAS.
//! - **Concurrency**: a failed CAS restarts the whole operation from the
//!   root; lookups never retry because every loaded snapshot is
//!   self-consistent.
//! - **Reclamation**: replaced snapshots are retired through petek and
//!   freed only after every thread that could have observed them has
//!   unpinned.

use crate::node::{Branch, CNode, Entry, INode, LNode, MainNode, W, expand, flag_pos};
use core::hash::BuildHasher;
use foldhash::fast::FixedState;
use petek::{Guard, Ordering, Shared, pin, retire};
use portable_atomic::AtomicU64;
use std::sync::Arc;

/// A simple exponential backoff for reducing contention.
struct Backoff {
    step: u32,
}

impl Backoff {
    #[inline(always)]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline(always)]
    fn spin(&mut self) {
        for _ in 0..(1 << self.step.min(6)) {
            core::hint::spin_loop();
        }
        if self.step <= 6 {
            self.step += 1;
        }
    }
}

/// Signal that a CAS lost a race and the operation must restart from
/// the root. Never surfaced to callers.
struct Retry;

/// Lock-free concurrent hash trie mapping byte-sequence keys to values.
///
/// Insert, lookup, and removal are linearizable and may be called from
/// any number of threads without mutual exclusion. The branch arrays
/// contract as entries are removed, so the trie's height stays
/// proportional to the number of live entries.
///
/// # Type Parameters
///
/// - `V`: value type (cloned out on reads)
/// - `S`: hash capability, bound immutably at construction
///   (defaults to `foldhash::fast::FixedState`)
pub struct Ctrie<V, S = FixedState> {
    root: INode<V>,
    count: AtomicU64,
    hasher: S,
}

impl<V> Ctrie<V, FixedState>
where
    V: Clone + 'static,
{
    /// Creates an empty trie with the default hash capability.
    ///
    /// # Examples
    ///
    /// ```
    /// use petek_trie::Ctrie;
    ///
    /// let trie: Ctrie<u64> = Ctrie::new();
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(FixedState::default())
    }
}

impl<V> Default for Ctrie<V, FixedState>
where
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S> Ctrie<V, S>
where
    V: Clone + 'static,
    S: BuildHasher,
{
    /// Creates an empty trie with a custom hash capability.
    ///
    /// The capability is fixed for the trie's lifetime; replacing the
    /// hash function on a live structure would silently orphan every
    /// previously inserted entry.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            root: INode::new(MainNode::Branches(CNode::empty())),
            count: AtomicU64::new(0),
            hasher,
        }
    }

    #[inline]
    fn hash(&self, key: &[u8]) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Installs or overwrites the mapping for `key`, returning the
    /// previous value on overwrite.
    pub fn insert(&self, key: &[u8], value: V) -> Option<V> {
        let hash = self.hash(key);
        let guard = pin();
        let mut backoff = Backoff::new();
        loop {
            match self.iinsert(&self.root, key, hash, &value, 0, None, &guard) {
                Ok(prev) => {
                    if prev.is_none() {
                        self.count.fetch_add(1, Ordering::Relaxed);
                    }
                    return prev;
                }
                Err(Retry) => backoff.spin(),
            }
        }
    }

    /// Returns the current value for `key`, or `None`.
    pub fn get(&self, key: &[u8]) -> Option<V> {
        let hash = self.hash(key);
        let guard = pin();
        self.ilookup(&self.root, key, hash, 0, &guard)
    }

    /// Returns true if `key` is currently mapped.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Removes the mapping for `key`, returning the prior value.
    pub fn remove(&self, key: &[u8]) -> Option<V> {
        let hash = self.hash(key);
        let guard = pin();
        let mut backoff = Backoff::new();
        loop {
            match self.iremove(&self.root, key, hash, 0, None, &guard) {
                Ok(prev) => {
                    if prev.is_some() {
                        self.count.fetch_sub(1, Ordering::Relaxed);
                    }
                    return prev;
                }
                Err(Retry) => backoff.spin(),
            }
        }
    }

    /// Returns the number of live entries.
    ///
    /// Maintained as a counter; exact once concurrent writers quiesce.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed) as usize
    }

    /// Returns true if the trie holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries by swapping in an empty root snapshot.
    pub fn clear(&self) {
        let guard = pin();
        let mut backoff = Backoff::new();
        loop {
            let main = self.root.main.load(Ordering::Acquire, &guard);
            match cas_main(&self.root, main, MainNode::Branches(CNode::empty()), &guard) {
                Ok(()) => {
                    self.count.store(0, Ordering::Relaxed);
                    return;
                }
                Err(Retry) => backoff.spin(),
            }
        }
    }

    /// Get the underlying hash capability.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Returns an iterator over the entries, in no particular order.
    ///
    /// The iterator holds a guard for its whole lifetime and observes a
    /// best-effort view: entries inserted or removed concurrently may or
    /// may not appear.
    pub fn iter(&self) -> Iter<'_, V, S> {
        let guard = pin();
        let main = self.root.main.load(Ordering::Acquire, &guard);
        let mut stack = Vec::new();
        match unsafe { main.deref() } {
            MainNode::Branches(cn) => stack.push((cn as *const CNode<V>, 0)),
            _ => unreachable!("root main node is always a branch array"),
        }
        Iter {
            stack,
            lnode: core::ptr::null(),
            guard,
            _parent: core::marker::PhantomData,
        }
    }

    /// Returns an iterator over the keys, in no particular order.
    pub fn keys(&self) -> Keys<'_, V, S> {
        Keys { iter: self.iter() }
    }

    fn iinsert(
        &self,
        inode: &INode<V>,
        key: &[u8],
        hash: u64,
        value: &V,
        lev: u32,
        parent: Option<&INode<V>>,
        guard: &Guard,
    ) -> Result<Option<V>, Retry> {
        // Linearization point for this level.
        let main = inode.main.load(Ordering::Acquire, guard);
        match unsafe { main.deref() } {
            MainNode::Branches(cn) => {
                let (flag, pos) = flag_pos(hash, lev, cn.bitmap);
                if cn.bitmap & flag == 0 {
                    // Bit unset: publish a copy with the new leaf at the
                    // sorted position.
                    let leaf = Arc::new(Entry::new(key, hash, value.clone()));
                    let ncn = cn.inserted(pos, flag, Branch::Leaf(leaf));
                    return cas_main(inode, main, MainNode::Branches(ncn), guard).map(|()| None);
                }
                match &cn.array[pos as usize] {
                    Branch::Indirection(child) => {
                        self.iinsert(child, key, hash, value, lev + W, Some(inode), guard)
                    }
                    Branch::Leaf(leaf) if *leaf.key == *key => {
                        // Same key: replace the leaf in place.
                        let prev = leaf.value.clone();
                        let nleaf = Arc::new(Entry::new(key, hash, value.clone()));
                        let ncn = cn.updated(pos, Branch::Leaf(nleaf));
                        cas_main(inode, main, MainNode::Branches(ncn), guard).map(|()| Some(prev))
                    }
                    Branch::Leaf(leaf) => {
                        // Hash prefixes collide here: grow a level that
                        // separates the two keys.
                        let nleaf = Arc::new(Entry::new(key, hash, value.clone()));
                        let inner = INode::new(expand(leaf.clone(), nleaf, lev + W));
                        let ncn = cn.updated(pos, Branch::Indirection(Arc::new(inner)));
                        cas_main(inode, main, MainNode::Branches(ncn), guard).map(|()| None)
                    }
                }
            }
            MainNode::Tomb(_) => {
                // A tombed I-node cannot be mutated; compress the parent
                // so the retry descends into a live snapshot.
                if let Some(parent) = parent {
                    clean(parent, lev - W, guard);
                }
                Err(Retry)
            }
            MainNode::Collision(ln) => match ln.find(key) {
                Some(existing) => {
                    let prev = existing.value.clone();
                    let mut leaves = ln.leaves();
                    for leaf in &mut leaves {
                        if *leaf.key == *key {
                            *leaf = Arc::new(Entry::new(key, hash, value.clone()));
                        }
                    }
                    let nln = LNode::from_leaves(leaves);
                    cas_main(inode, main, MainNode::Collision(nln), guard).map(|()| Some(prev))
                }
                None => {
                    let nln = LNode {
                        leaf: Arc::new(Entry::new(key, hash, value.clone())),
                        next: Some(Arc::new(ln.clone())),
                    };
                    cas_main(inode, main, MainNode::Collision(nln), guard).map(|()| None)
                }
            },
        }
    }

    fn ilookup(
        &self,
        inode: &INode<V>,
        key: &[u8],
        hash: u64,
        lev: u32,
        guard: &Guard,
    ) -> Option<V> {
        // Linearization point: one immutable snapshot per level.
        let main = inode.main.load(Ordering::Acquire, guard);
        match unsafe { main.deref() } {
            MainNode::Branches(cn) => {
                let (flag, pos) = flag_pos(hash, lev, cn.bitmap);
                if cn.bitmap & flag == 0 {
                    // No entry with this hash prefix exists.
                    return None;
                }
                match &cn.array[pos as usize] {
                    Branch::Indirection(child) => {
                        self.ilookup(child, key, hash, lev + W, guard)
                    }
                    // Full key comparison: equal hash prefixes may alias.
                    Branch::Leaf(leaf) if *leaf.key == *key => Some(leaf.value.clone()),
                    Branch::Leaf(_) => None,
                }
            }
            // A tombed leaf is still a live entry; compare like a leaf.
            MainNode::Tomb(entry) if *entry.key == *key => Some(entry.value.clone()),
            MainNode::Tomb(_) => None,
            MainNode::Collision(ln) => ln.find(key).map(|entry| entry.value.clone()),
        }
    }

    fn iremove(
        &self,
        inode: &INode<V>,
        key: &[u8],
        hash: u64,
        lev: u32,
        parent: Option<&INode<V>>,
        guard: &Guard,
    ) -> Result<Option<V>, Retry> {
        let main = inode.main.load(Ordering::Acquire, guard);
        match unsafe { main.deref() } {
            MainNode::Branches(cn) => {
                let (flag, pos) = flag_pos(hash, lev, cn.bitmap);
                if cn.bitmap & flag == 0 {
                    return Ok(None);
                }
                match &cn.array[pos as usize] {
                    Branch::Indirection(child) => {
                        self.iremove(child, key, hash, lev + W, Some(inode), guard)
                    }
                    Branch::Leaf(leaf) if *leaf.key == *key => {
                        let prev = leaf.value.clone();
                        let ncn = cn.removed(pos, flag);
                        let contracted = to_contracted(ncn, lev);
                        cas_main(inode, main, contracted, guard)?;
                        // The removal is linearized; collapsing a fresh
                        // tomb into the parent is best-effort cleanup.
                        if let Some(parent) = parent {
                            let current = inode.main.load(Ordering::Acquire, guard);
                            if matches!(unsafe { current.deref() }, MainNode::Tomb(_)) {
                                clean_parent(parent, inode, hash, lev - W, guard);
                            }
                        }
                        Ok(Some(prev))
                    }
                    Branch::Leaf(_) => Ok(None),
                }
            }
            MainNode::Tomb(_) => {
                if let Some(parent) = parent {
                    clean(parent, lev - W, guard);
                }
                Err(Retry)
            }
            MainNode::Collision(ln) => {
                if ln.find(key).is_none() {
                    return Ok(None);
                }
                let mut prev = None;
                let mut remaining = Vec::with_capacity(ln.len() - 1);
                for leaf in ln.leaves() {
                    if *leaf.key == *key {
                        prev = Some(leaf.value.clone());
                    } else {
                        remaining.push(leaf);
                    }
                }
                // A collision list only exists past the hash bits, which
                // is never the root: a single survivor contracts to a
                // tomb just like a singleton branch array.
                let nmain = match remaining.len() {
                    1 => MainNode::Tomb(remaining.remove(0)),
                    _ => MainNode::Collision(LNode::from_leaves(remaining)),
                };
                cas_main(inode, main, nmain, guard)?;
                if let Some(parent) = parent {
                    let current = inode.main.load(Ordering::Acquire, guard);
                    if matches!(unsafe { current.deref() }, MainNode::Tomb(_)) {
                        clean_parent(parent, inode, hash, lev - W, guard);
                    }
                }
                Ok(prev)
            }
        }
    }
}

// SAFETY: All shared state is either immutable or accessed through
// atomics; V travels between threads via Arc'd entries.
unsafe impl<V: Send + Sync, S: Send> Send for Ctrie<V, S> {}
unsafe impl<V: Send + Sync, S: Sync> Sync for Ctrie<V, S> {}

/// Publish `new` as the I-node's main snapshot if it still points at
/// `current`. On success the old snapshot is retired; on failure the
/// speculative snapshot is dropped and the operation must restart.
fn cas_main<V: 'static>(
    inode: &INode<V>,
    current: Shared<'_, MainNode<V>>,
    new: MainNode<V>,
    guard: &Guard,
) -> Result<(), Retry> {
    let new_ptr = Box::into_raw(Box::new(new));
    match inode.main.compare_exchange(
        current,
        unsafe { Shared::from_raw(new_ptr) },
        Ordering::Release,
        Ordering::Relaxed,
        guard,
    ) {
        Ok(_) => {
            retire(current.as_raw());
            Ok(())
        }
        Err(_) => {
            // SAFETY: The CAS failed, so new_ptr was never published.
            unsafe { drop(Box::from_raw(new_ptr)) };
            Err(Retry)
        }
    }
}

/// Contraction: a non-root branch array reduced to a single leaf
/// becomes a tombed leaf so the parent can compact it.
fn to_contracted<V>(cn: CNode<V>, lev: u32) -> MainNode<V> {
    if lev > 0 && cn.array.len() == 1 {
        if let Branch::Leaf(leaf) = &cn.array[0] {
            return MainNode::Tomb(leaf.clone());
        }
    }
    MainNode::Branches(cn)
}

/// Compression: rebuild a branch array with every tombed child
/// resurrected, then contract the result.
fn to_compressed<V>(cn: &CNode<V>, lev: u32, guard: &Guard) -> MainNode<V> {
    let array = cn.array.iter().map(|b| resurrect(b, guard)).collect();
    to_contracted(
        CNode {
            bitmap: cn.bitmap,
            array,
        },
        lev,
    )
}

/// If the branch is an I-node whose current main is a tombed leaf,
/// return the wrapped leaf in its place.
fn resurrect<V>(branch: &Branch<V>, guard: &Guard) -> Branch<V> {
    if let Branch::Indirection(inode) = branch {
        let main = inode.main.load(Ordering::Acquire, guard);
        if let MainNode::Tomb(entry) = unsafe { main.deref() } {
            return Branch::Leaf(entry.clone());
        }
    }
    branch.clone()
}

/// Replace an I-node's branch array with its compressed form.
/// Best-effort: a lost CAS means someone else already changed it.
fn clean<V: 'static>(inode: &INode<V>, lev: u32, guard: &Guard) {
    let main = inode.main.load(Ordering::Acquire, guard);
    if let MainNode::Branches(cn) = unsafe { main.deref() } {
        let _ = cas_main(inode, main, to_compressed(cn, lev, guard), guard);
    }
}

/// Collapse a freshly tombed I-node into its parent: if the parent's
/// branch for this hash still points at `inode` and `inode` is still
/// tombed, swap the branch for the wrapped leaf directly. Retried from
/// a fresh read on CAS failure; gives up once the tomb is gone.
fn clean_parent<V: 'static>(
    parent: &INode<V>,
    inode: &INode<V>,
    hash: u64,
    lev: u32,
    guard: &Guard,
) {
    loop {
        let main = inode.main.load(Ordering::Acquire, guard);
        let pmain = parent.main.load(Ordering::Acquire, guard);
        if let MainNode::Branches(pcn) = unsafe { pmain.deref() } {
            let (flag, pos) = flag_pos(hash, lev, pcn.bitmap);
            if pcn.bitmap & flag == 0 {
                return;
            }
            match &pcn.array[pos as usize] {
                Branch::Indirection(child) if std::ptr::eq(child.as_ref(), inode) => {}
                _ => return,
            }
            if let MainNode::Tomb(entry) = unsafe { main.deref() } {
                let ncn = pcn.updated(pos, Branch::Leaf(entry.clone()));
                if cas_main(parent, pmain, to_contracted(ncn, lev), guard).is_err() {
                    continue;
                }
            }
        }
        return;
    }
}

/// Iterator over the trie's entries. Yields `(key, value)` clones in no
/// particular order while holding a guard that keeps every visited
/// snapshot alive.
pub struct Iter<'a, V, S> {
    stack: Vec<(*const CNode<V>, usize)>,
    lnode: *const LNode<V>,
    guard: Guard,
    _parent: core::marker::PhantomData<&'a Ctrie<V, S>>,
}

impl<V, S> Iterator for Iter<'_, V, S>
where
    V: Clone,
{
    type Item = (Box<[u8]>, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.lnode.is_null() {
                // SAFETY: The list is reachable from a snapshot loaded
                // under self.guard.
                let ln = unsafe { &*self.lnode };
                self.lnode = match &ln.next {
                    Some(next) => Arc::as_ptr(next),
                    None => core::ptr::null(),
                };
                return Some((ln.leaf.key.clone(), ln.leaf.value.clone()));
            }

            let (cn_ptr, idx) = self.stack.last_mut()?;
            // SAFETY: Same guard argument as above.
            let cn = unsafe { &**cn_ptr };
            let i = *idx;
            if i >= cn.array.len() {
                self.stack.pop();
                continue;
            }
            *idx = i + 1;

            match &cn.array[i] {
                Branch::Leaf(leaf) => {
                    return Some((leaf.key.clone(), leaf.value.clone()));
                }
                Branch::Indirection(inode) => {
                    let main = inode.main.load(Ordering::Acquire, &self.guard);
                    match unsafe { main.deref() } {
                        MainNode::Branches(cn) => self.stack.push((cn as *const CNode<V>, 0)),
                        MainNode::Tomb(entry) => {
                            return Some((entry.key.clone(), entry.value.clone()));
                        }
                        MainNode::Collision(ln) => self.lnode = ln as *const LNode<V>,
                    }
                }
            }
        }
    }
}

/// Iterator over the trie's keys.
pub struct Keys<'a, V, S> {
    iter: Iter<'a, V, S>,
}

impl<V, S> Iterator for Keys<'_, V, S>
where
    V: Clone,
{
    type Item = Box<[u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, _)| k)
    }
}

impl<'a, V, S> IntoIterator for &'a Ctrie<V, S>
where
    V: Clone + 'static,
    S: BuildHasher,
{
    type Item = (Box<[u8]>, V);
    type IntoIter = Iter<'a, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
