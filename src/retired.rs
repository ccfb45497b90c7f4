//! Deferred destruction records.
//!
//! A retired allocation is captured as a type-erased pointer plus a
//! monomorphized drop function, batched into epoch-tagged bags.

/// A single retired allocation awaiting its grace period.
pub(crate) struct Retired {
    ptr: *mut (),
    drop_fn: unsafe fn(*mut ()),
}

// SAFETY: A Retired is only ever reclaimed once, by whichever thread
// observes its grace period expire; the pointer is not shared otherwise.
unsafe impl Send for Retired {}

impl Retired {
    /// Capture `ptr` (obtained from `Box::into_raw`) for deferred drop.
    pub(crate) fn new<T: 'static>(ptr: *mut T) -> Self {
        unsafe fn drop_box<T>(ptr: *mut ()) {
            // SAFETY: `ptr` came from `Box::into_raw` for a `T` and this
            // function runs exactly once per retirement.
            unsafe { drop(Box::from_raw(ptr.cast::<T>())) };
        }

        Self {
            ptr: ptr.cast(),
            drop_fn: drop_box::<T>,
        }
    }

    /// Run the deferred drop.
    ///
    /// # Safety
    ///
    /// No thread may still hold a reference to the allocation; the caller
    /// must have established that the grace period has passed.
    pub(crate) unsafe fn reclaim(self) {
        unsafe { (self.drop_fn)(self.ptr) };
    }
}

/// A batch of retirements tagged with the global epoch they were
/// unlinked in. Safe to reclaim once the epoch has advanced twice past
/// the tag.
pub(crate) struct Bag {
    pub(crate) epoch: u64,
    pub(crate) items: Vec<Retired>,
}

impl Bag {
    pub(crate) fn new(epoch: u64) -> Self {
        Self {
            epoch,
            items: Vec::new(),
        }
    }
}
