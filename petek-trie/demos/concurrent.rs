//! Example demonstrating concurrent operations on the lock-free hash trie
//!
//! This example shows multiple threads performing concurrent inserts, reads,
//! and removes without any locks or blocking.

use petek_trie::Ctrie;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("=== Lock-Free Concurrent Hash Trie Demo ===\n");

    // Create a shared trie
    let trie: Arc<Ctrie<u64>> = Arc::new(Ctrie::new());

    // Benchmark concurrent inserts
    println!("Benchmarking concurrent inserts...");
    let start = Instant::now();
    let mut handles = Vec::new();

    // Spawn 8 threads, each inserting 10,000 elements
    for thread_id in 0..8u64 {
        let trie_clone = Arc::clone(&trie);
        let handle = thread::spawn(move || {
            for i in 0..10_000 {
                let key = thread_id * 10_000 + i;
                trie_clone.insert(&key.to_be_bytes(), key * 2);
            }
        });
        handles.push(handle);
    }

    // Wait for all threads to complete
    for handle in handles {
        handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Inserted 80,000 entries from 8 threads in {:?} ({:.2} ops/sec)",
        duration,
        80_000.0 / duration.as_secs_f64()
    );
    println!("Trie contains {} entries\n", trie.len());

    // Benchmark concurrent reads
    println!("Benchmarking concurrent reads...");
    let start = Instant::now();
    let mut handles = Vec::new();

    // Spawn 8 threads, each reading 10,000 elements
    for _ in 0..8 {
        let trie_clone = Arc::clone(&trie);
        let handle = thread::spawn(move || {
            let mut found = 0;
            for key in 0..10_000u64 {
                if trie_clone.get(&key.to_be_bytes()).is_some() {
                    found += 1;
                }
            }
            found
        });
        handles.push(handle);
    }

    // Wait for all threads and sum results
    let mut total_found = 0;
    for handle in handles {
        total_found += handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Performed 80,000 reads from 8 threads in {:?} ({:.2} ops/sec)",
        duration,
        80_000.0 / duration.as_secs_f64()
    );
    println!("Found {} entries during reads\n", total_found);

    // Benchmark mixed operations
    println!("Benchmarking mixed concurrent operations...");
    let start = Instant::now();
    let mut handles = Vec::new();

    // Spawn 4 reader threads
    for _ in 0..4 {
        let trie_clone = Arc::clone(&trie);
        let handle = thread::spawn(move || {
            for key in 0..5_000u64 {
                let _ = trie_clone.get(&key.to_be_bytes());
            }
        });
        handles.push(handle);
    }

    // Spawn 2 writer threads
    for thread_id in 0..2u64 {
        let trie_clone = Arc::clone(&trie);
        let handle = thread::spawn(move || {
            for i in 0..5_000 {
                let key = 80_000 + thread_id * 5_000 + i;
                trie_clone.insert(&key.to_be_bytes(), key);
            }
        });
        handles.push(handle);
    }

    // Spawn 2 removal threads
    for thread_id in 0..2u64 {
        let trie_clone = Arc::clone(&trie);
        let handle = thread::spawn(move || {
            for i in 0..2_500 {
                let key = thread_id * 2_500 + i;
                trie_clone.remove(&key.to_be_bytes());
            }
        });
        handles.push(handle);
    }

    // Wait for all threads
    for handle in handles {
        handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!("Mixed operations completed in {:?}", duration);
    println!("Final trie size: {} entries\n", trie.len());

    // Verify some data
    println!("Verifying data integrity...");
    let mut verified = 0;
    for key in 5_000..10_000u64 {
        if trie.get(&key.to_be_bytes()) == Some(key * 2) {
            verified += 1;
        }
    }
    println!("Verified {} entries have correct values", verified);

    println!("\n=== Demo Complete ===");
    println!("All operations completed without any locks or blocking!");
}
