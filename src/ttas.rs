//! TTAS (Test-Test-And-Set) spinlock for cold-path shared state.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A TTAS spinlock.
///
/// Only used off the hot path (thread id recycling, orphaned garbage);
/// the reclamation fast path never takes it.
pub(crate) struct TTas<T: ?Sized> {
    acquired: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for TTas<T> {}
unsafe impl<T: ?Sized + Send> Sync for TTas<T> {}

impl<T> TTas<T> {
    pub(crate) const fn new(data: T) -> Self {
        Self {
            acquired: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, spinning on a relaxed load between attempts.
    #[inline]
    pub(crate) fn lock(&self) -> TTasGuard<'_, T> {
        loop {
            while self.acquired.load(Ordering::Relaxed) {
                spin_loop();
            }
            if !self.acquired.swap(true, Ordering::Acquire) {
                return TTasGuard { ttas: self };
            }
        }
    }
}

/// RAII guard releasing the lock on drop.
pub(crate) struct TTasGuard<'a, T: ?Sized> {
    ttas: &'a TTas<T>,
}

impl<T: ?Sized> Deref for TTasGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The lock is held for the lifetime of the guard.
        unsafe { &*self.ttas.data.get() }
    }
}

impl<T: ?Sized> DerefMut for TTasGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held exclusively for the lifetime of the guard.
        unsafe { &mut *self.ttas.data.get() }
    }
}

impl<T: ?Sized> Drop for TTasGuard<'_, T> {
    fn drop(&mut self) {
        self.ttas.acquired.store(false, Ordering::Release);
    }
}
