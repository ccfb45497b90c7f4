//! Guard and handle for critical section management.

use crate::epoch::{GRACE, RETIRE_FREQ, global};
use crate::retired::{Bag, Retired};
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use std::collections::VecDeque;

/// RAII guard representing an active critical section.
///
/// While a Guard exists, the owning thread's slot is active and any
/// `Shared<'g, T>` pointers loaded under it are guaranteed to remain
/// valid. Guards may nest freely within a thread.
pub struct Guard {
    _not_send: PhantomData<*mut ()>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = HANDLE.try_with(|h| h.unpin());
    }
}

/// Thread-local handle: slot id, pin depth, and epoch-tagged garbage bags.
struct Handle {
    tid: usize,
    guards: Cell<usize>,
    retires: Cell<usize>,
    bags: RefCell<VecDeque<Bag>>,
}

impl Handle {
    fn new() -> Self {
        Self {
            tid: global().alloc_tid(),
            guards: Cell::new(0),
            retires: Cell::new(0),
            bags: RefCell::new(VecDeque::new()),
        }
    }

    fn pin(&self) -> Guard {
        let depth = self.guards.get();
        self.guards.set(depth + 1);
        if depth == 0 {
            let global = global();
            let slot = global.slot(self.tid);
            // Publish the epoch we entered under; re-publish if the
            // global epoch moved while the store was in flight.
            loop {
                let epoch = global.current_epoch();
                slot.publish(epoch);
                if global.current_epoch() == epoch {
                    break;
                }
            }
        }
        Guard {
            _not_send: PhantomData,
        }
    }

    fn unpin(&self) {
        let depth = self.guards.get() - 1;
        self.guards.set(depth);
        if depth == 0 {
            global().slot(self.tid).clear();
        }
    }

    fn retire<T: 'static>(&self, ptr: *mut T) {
        let epoch = global().current_epoch();
        {
            let mut bags = self.bags.borrow_mut();
            match bags.back_mut() {
                Some(bag) if bag.epoch == epoch => bag.items.push(Retired::new(ptr)),
                _ => {
                    let mut bag = Bag::new(epoch);
                    bag.items.push(Retired::new(ptr));
                    bags.push_back(bag);
                }
            }
        }
        let retires = self.retires.get().wrapping_add(1);
        self.retires.set(retires);
        if retires % RETIRE_FREQ == 0 {
            self.collect();
        }
    }

    fn collect(&self) {
        let global = global();
        let epoch = global.try_advance();

        let mut ready = Vec::new();
        {
            let mut bags = self.bags.borrow_mut();
            while bags.front().is_some_and(|bag| bag.epoch + GRACE <= epoch) {
                if let Some(bag) = bags.pop_front() {
                    ready.push(bag);
                }
            }
        }
        ready.extend(global.take_expired_orphans(epoch));

        // The bag borrow is released above: destructors running here may
        // re-enter retire() for their own garbage.
        for bag in ready {
            for retired in bag.items {
                // SAFETY: Two epoch advances have passed since this
                // allocation was retired, so every guard that could have
                // observed it has been dropped.
                unsafe { retired.reclaim() };
            }
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let global = global();
        global.slot(self.tid).clear();
        let epoch = global.try_advance();

        let mut leftovers = Vec::new();
        for bag in self.bags.borrow_mut().drain(..) {
            if bag.epoch + GRACE <= epoch {
                for retired in bag.items {
                    // SAFETY: Grace period passed, same argument as collect().
                    unsafe { retired.reclaim() };
                }
            } else {
                leftovers.push(bag);
            }
        }
        if !leftovers.is_empty() {
            global.adopt_orphans(leftovers);
        }
        global.free_tid(self.tid);
    }
}

std::thread_local! {
    static HANDLE: Handle = Handle::new();
}

/// Enter a critical section.
///
/// Returns a `Guard` representing the active critical section. While
/// the guard exists, any `Shared<'g, T>` pointers loaded under it are
/// guaranteed to remain valid.
///
/// # Examples
///
/// ```rust
/// use petek::pin;
///
/// let guard = pin();
/// // Access lock-free data structures safely
/// drop(guard);
/// ```
#[inline]
pub fn pin() -> Guard {
    HANDLE.with(|h| h.pin())
}

/// Retire an allocation for deferred destruction.
///
/// The allocation is dropped only after every thread that could have
/// observed it has unpinned. The caller must hold a guard spanning the
/// unlinking operation (the CAS that made the allocation unreachable).
///
/// # Safety contract
///
/// `ptr` must come from `Box::into_raw`, must be unreachable to threads
/// that pin after this call, and must not be retired twice.
#[inline]
pub fn retire<T: 'static>(ptr: *mut T) {
    HANDLE.with(|h| h.retire(ptr));
}

/// Flush the calling thread's garbage and attempt collection.
///
/// Collection normally runs every few retirements; this forces an
/// immediate attempt. Useful on shutdown paths and in tests.
#[inline]
pub fn flush() {
    HANDLE.with(|h| h.collect());
}
