//! Petek: epoch-based safe memory reclamation for lock-free data structures.
//!
//! Petek implements classic epoch-based reclamation: threads pin into a
//! per-thread slot before touching shared pointers, retired allocations
//! are batched into epoch-tagged bags, and a bag is freed only after
//! the global epoch has advanced twice past its tag, at which point no
//! pinned thread can still hold a reference into it.
//!
//! # Key Features
//!
//! - **Cheap Reads**: A pinned load is a single atomic read
//! - **Lock-Free Progress**: The mutation path never blocks
//! - **Slot-Based Epochs**: Cache-line-aligned per-thread epoch slots
//! - **Batch Retirement**: Amortized reclamation cost, orphan handoff
//!   on thread exit
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::Ordering;
//! use petek::{Atomic, pin, retire};
//!
//! let atomic = Atomic::new(Box::into_raw(Box::new(42)));
//!
//! // Enter critical section
//! let guard = pin();
//!
//! // Load under the guard
//! let ptr = atomic.load(Ordering::Acquire, &guard);
//!
//! // Access safely within guard lifetime
//! unsafe {
//!     if let Some(value) = ptr.as_ref() {
//!         println!("Value: {}", value);
//!     }
//! }
//!
//! drop(guard);
//! # unsafe { drop(Box::from_raw(atomic.load_raw(Ordering::Relaxed))) };
//! ```

#![warn(missing_docs)]

mod atomic;
mod epoch;
mod guard;
mod retired;
mod ttas;

pub use atomic::{Atomic, Shared};
pub use guard::{Guard, flush, pin, retire};

// Re-export for convenience
pub use core::sync::atomic::Ordering;
