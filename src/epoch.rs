//! Global epoch state and per-thread slots.
//!
//! Each registered thread owns one cache-line-aligned slot into which it
//! publishes the global epoch it pinned under, together with an active
//! flag. The global epoch advances only when every active slot has
//! caught up to it, which bounds how far any reader can lag behind and
//! yields the two-epoch grace period used by reclamation.

use crate::retired::Bag;
use crate::ttas::TTas;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use once_cell::race::OnceBox;

/// Maximum number of threads supported.
pub(crate) const MAX_THREADS: usize = 128;

/// Collection attempt frequency (try to reclaim every `freq` retires).
pub(crate) const RETIRE_FREQ: usize = 64;

/// Grace period in epochs: garbage retired under epoch `e` is free to
/// reclaim once the global epoch reaches `e + GRACE`.
pub(crate) const GRACE: u64 = 2;

/// Per-thread epoch slot.
///
/// Encoding: `epoch << 1 | active`. An inactive slot never blocks epoch
/// advancement.
#[repr(align(128))]
pub(crate) struct Slot {
    state: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
        }
    }

    /// Publish `epoch` and mark the slot active.
    #[inline]
    pub(crate) fn publish(&self, epoch: u64) {
        self.state.store(epoch << 1 | 1, Ordering::SeqCst);
    }

    /// Mark the slot inactive.
    #[inline]
    pub(crate) fn clear(&self) {
        self.state.store(0, Ordering::Release);
    }

    /// Returns the published epoch if the slot is active.
    #[inline]
    pub(crate) fn load(&self) -> Option<u64> {
        let state = self.state.load(Ordering::SeqCst);
        (state & 1 == 1).then(|| state >> 1)
    }
}

/// Global reclamation state.
pub(crate) struct EpochState {
    slots: Box<[Slot]>,
    epoch: AtomicU64,
    next_tid: AtomicUsize,
    free_tids: TTas<Vec<usize>>,
    orphans: TTas<Vec<Bag>>,
}

impl EpochState {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_THREADS);
        for _ in 0..MAX_THREADS {
            slots.push(Slot::new());
        }
        Self {
            slots: slots.into_boxed_slice(),
            epoch: AtomicU64::new(1),
            next_tid: AtomicUsize::new(0),
            free_tids: TTas::new(Vec::new()),
            orphans: TTas::new(Vec::new()),
        }
    }

    /// Get the slot for a given thread id.
    #[inline]
    pub(crate) fn slot(&self, tid: usize) -> &Slot {
        &self.slots[tid]
    }

    /// Get the current global epoch.
    #[inline]
    pub(crate) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Advance the global epoch if every active slot has caught up to
    /// it. Returns the global epoch after the attempt.
    pub(crate) fn try_advance(&self) -> u64 {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let in_use = self.next_tid.load(Ordering::Acquire).min(MAX_THREADS);
        for slot in &self.slots[..in_use] {
            if let Some(seen) = slot.load() {
                if seen != epoch {
                    return epoch;
                }
            }
        }
        match self
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => epoch + 1,
            Err(current) => current,
        }
    }

    /// Allocate a thread id, recycling released ones first.
    pub(crate) fn alloc_tid(&self) -> usize {
        {
            let mut free = self.free_tids.lock();
            if let Some(tid) = free.pop() {
                return tid;
            }
        }
        let tid = self.next_tid.fetch_add(1, Ordering::AcqRel);
        assert!(
            tid < MAX_THREADS,
            "petek: exceeded maximum thread count ({MAX_THREADS})"
        );
        tid
    }

    /// Release a thread id for recycling.
    pub(crate) fn free_tid(&self, tid: usize) {
        self.slots[tid].clear();
        self.free_tids.lock().push(tid);
    }

    /// Hand garbage from an exiting thread to the global orphan list.
    pub(crate) fn adopt_orphans(&self, mut bags: Vec<Bag>) {
        self.orphans.lock().append(&mut bags);
    }

    /// Remove and return orphaned bags whose grace period has passed.
    pub(crate) fn take_expired_orphans(&self, epoch: u64) -> Vec<Bag> {
        let mut orphans = self.orphans.lock();
        if orphans.is_empty() {
            return Vec::new();
        }
        let mut expired = Vec::new();
        let mut kept = Vec::new();
        for bag in orphans.drain(..) {
            if bag.epoch + GRACE <= epoch {
                expired.push(bag);
            } else {
                kept.push(bag);
            }
        }
        *orphans = kept;
        expired
    }
}

/// Global singleton instance.
static GLOBAL: OnceBox<EpochState> = OnceBox::new();

/// Get reference to the global epoch state.
#[inline]
pub(crate) fn global() -> &'static EpochState {
    GLOBAL.get_or_init(|| Box::new(EpochState::new()))
}
