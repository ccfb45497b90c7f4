//! Atomic pointer types with guard-scoped access.
//!
//! `Atomic<T>` is an atomic cell holding a raw pointer to a heap
//! allocation; `Shared<'g, T>` is a loaded pointer whose validity is
//! tied to the lifetime of a [`Guard`].

use crate::guard::Guard;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// A pointer to a heap-allocated value with atomic operations.
///
/// Provides atomic load, store, swap, and compare-exchange on pointers
/// to `T`. Loads are guard-scoped: the returned [`Shared`] cannot
/// outlive the guard it was loaded under, which is what keeps retired
/// allocations alive long enough for in-flight readers.
pub struct Atomic<T> {
    data: AtomicPtr<T>,
}

unsafe impl<T: Send + Sync> Send for Atomic<T> {}
unsafe impl<T: Send + Sync> Sync for Atomic<T> {}

impl<T> Atomic<T> {
    /// Creates a new atomic cell holding `ptr`.
    #[inline]
    pub fn new(ptr: *mut T) -> Self {
        Self {
            data: AtomicPtr::new(ptr),
        }
    }

    /// Creates a null atomic cell.
    #[inline]
    pub fn null() -> Self {
        Self::new(ptr::null_mut())
    }

    /// Loads the pointer under a guard.
    ///
    /// This is a single atomic load; the guard only constrains the
    /// lifetime of the result.
    #[inline]
    pub fn load<'g>(&self, order: Ordering, _guard: &'g Guard) -> Shared<'g, T> {
        Shared {
            data: self.data.load(order),
            _marker: PhantomData,
        }
    }

    /// Loads the raw pointer without a guard.
    ///
    /// The result carries no validity guarantee; dereferencing it is
    /// only sound under exclusive access (drop paths).
    #[inline]
    pub fn load_raw(&self, order: Ordering) -> *mut T {
        self.data.load(order)
    }

    /// Stores a pointer into the cell.
    #[inline]
    pub fn store(&self, ptr: Shared<'_, T>, order: Ordering) {
        self.data.store(ptr.data, order);
    }

    /// Compares and exchanges the pointer.
    ///
    /// On success the previous pointer is returned; on failure the
    /// actual current pointer is returned. Either way the result is
    /// valid for the guard's lifetime.
    #[inline]
    pub fn compare_exchange<'g>(
        &self,
        current: Shared<'_, T>,
        new: Shared<'_, T>,
        success: Ordering,
        failure: Ordering,
        _guard: &'g Guard,
    ) -> Result<Shared<'g, T>, Shared<'g, T>> {
        match self
            .data
            .compare_exchange(current.data, new.data, success, failure)
        {
            Ok(prev) => Ok(Shared {
                data: prev,
                _marker: PhantomData,
            }),
            Err(prev) => Err(Shared {
                data: prev,
                _marker: PhantomData,
            }),
        }
    }

    /// Compares and exchanges the pointer (weak version).
    ///
    /// May spuriously fail even when the comparison succeeds.
    #[inline]
    pub fn compare_exchange_weak<'g>(
        &self,
        current: Shared<'_, T>,
        new: Shared<'_, T>,
        success: Ordering,
        failure: Ordering,
        _guard: &'g Guard,
    ) -> Result<Shared<'g, T>, Shared<'g, T>> {
        match self
            .data
            .compare_exchange_weak(current.data, new.data, success, failure)
        {
            Ok(prev) => Ok(Shared {
                data: prev,
                _marker: PhantomData,
            }),
            Err(prev) => Err(Shared {
                data: prev,
                _marker: PhantomData,
            }),
        }
    }

    /// Swaps the pointer, returning the previous one.
    #[inline]
    pub fn swap<'g>(&self, new: Shared<'_, T>, order: Ordering, _guard: &'g Guard) -> Shared<'g, T> {
        Shared {
            data: self.data.swap(new.data, order),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Atomic<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// A pointer loaded under a guard.
///
/// The pointer is guaranteed to remain valid for the lifetime of the
/// guard it was loaded under; it cannot outlive it.
pub struct Shared<'g, T> {
    data: *mut T,
    _marker: PhantomData<(&'g Guard, *mut T)>,
}

impl<'g, T> Shared<'g, T> {
    /// Creates a shared pointer from a raw pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure the pointer is valid and remains valid
    /// for the lifetime of the guard it is associated with.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            data: ptr,
            _marker: PhantomData,
        }
    }

    /// Returns the null shared pointer.
    #[inline]
    pub fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            _marker: PhantomData,
        }
    }

    /// Returns the raw pointer.
    #[inline]
    pub fn as_raw(&self) -> *mut T {
        self.data
    }

    /// Returns true if the pointer is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Converts to an optional reference.
    ///
    /// # Safety
    ///
    /// The pointer must be properly aligned and point to a valid `T`
    /// (or be null).
    #[inline]
    pub unsafe fn as_ref(&self) -> Option<&'g T> {
        if self.is_null() {
            None
        } else {
            // SAFETY: Caller guarantees pointer validity.
            unsafe { Some(&*self.data) }
        }
    }

    /// Converts to a reference without checking for null.
    ///
    /// # Safety
    ///
    /// The pointer must be non-null and point to a valid `T`.
    #[inline]
    pub unsafe fn deref(&self) -> &'g T {
        // SAFETY: Caller guarantees pointer is non-null and valid.
        unsafe { &*self.data }
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shared<'_, T> {}

impl<T> PartialEq for Shared<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for Shared<'_, T> {}

impl<T> core::fmt::Debug for Shared<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Shared({:p})", self.data)
    }
}
