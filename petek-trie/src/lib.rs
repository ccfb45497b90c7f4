//! Lock-free concurrent hash trie using petek memory reclamation.
//!
//! This crate provides a concurrent hash-indexed trie (Ctrie) mapping
//! byte-sequence keys to values. Insert, lookup, and removal run from
//! any number of threads without mutexes or other blocking primitives,
//! using only atomic loads and copy-on-write snapshots published with a
//! single compare-and-swap.
//!
//! # Features
//!
//! - **Lock-Free**: the mutation path never blocks; a lost CAS just
//!   restarts the operation from the root
//! - **Linearizable**: every operation takes effect at one atomic
//!   main-node load or CAS
//! - **Compacting**: branch arrays contract as entries are removed, so
//!   the trie's height tracks the number of live entries
//! - **Safe Memory Reclamation**: retired snapshots are freed through
//!   petek's epoch scheme, never under a concurrent reader
//! - **Pluggable Hashing**: any `BuildHasher`, bound immutably at
//!   construction (foldhash by default)
//!
//! # Example
//!
//! ```rust
//! use petek_trie::Ctrie;
//!
//! let trie = Ctrie::new();
//!
//! // Insert from multiple threads safely
//! trie.insert(b"meaning", 42u64);
//! trie.insert(b"of-life", 54);
//!
//! // Read concurrently
//! assert_eq!(trie.get(b"meaning"), Some(42));
//!
//! // Remove entries, getting the prior value back
//! assert_eq!(trie.remove(b"of-life"), Some(54));
//! assert_eq!(trie.get(b"of-life"), None);
//! ```

#![warn(missing_docs)]

mod ctrie;
mod node;

pub use ctrie::{Ctrie, Iter, Keys};
