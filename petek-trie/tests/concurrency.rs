//! Multi-threaded stress tests for the concurrent hash trie.

use petek_trie::Ctrie;
use std::sync::Arc;
use std::thread;

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_distinct_inserts() {
    let trie = Arc::new(Ctrie::new());

    let mut handles = vec![];
    for t in 0..8u64 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            for i in 0..2000u64 {
                let key = (t * 2000 + i).to_be_bytes();
                trie.insert(&key, t * 2000 + i);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // Every entry is present with the right value, exactly once.
    assert_eq!(trie.len(), 16_000);
    assert_eq!(trie.iter().count(), 16_000);
    for i in 0..16_000u64 {
        assert_eq!(trie.get(&i.to_be_bytes()), Some(i));
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_heavy_contention_same_key() {
    let trie = Arc::new(Ctrie::new());

    let mut handles = vec![];
    for t in 0..8u64 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            for i in 0..5000u64 {
                trie.insert(b"hot", t * 5000 + i);
                let _ = trie.get(b"hot");
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert!(trie.get(b"hot").is_some());
    assert_eq!(trie.len(), 1);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_insert_remove_cycle() {
    let trie = Arc::new(Ctrie::new());

    let mut handles = vec![];
    for t in 0..4u64 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            for i in 0..2000u64 {
                let key = (t * 2000 + i).to_be_bytes();
                trie.insert(&key, i);
                if i % 2 == 0 {
                    assert_eq!(trie.remove(&key), Some(i));
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // Each thread kept its odd keys.
    assert_eq!(trie.len(), 4 * 1000);
    for t in 0..4u64 {
        for i in (1..2000u64).step_by(2) {
            assert_eq!(trie.get(&(t * 2000 + i).to_be_bytes()), Some(i));
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_read_heavy() {
    let trie = Arc::new(Ctrie::new());

    for i in 0..1000u64 {
        trie.insert(&i.to_be_bytes(), i * 2);
    }

    let mut handles = vec![];

    // Many readers over a stable key range.
    for _ in 0..8 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            for i in 0..10_000u64 {
                let key = i % 1000;
                assert_eq!(trie.get(&key.to_be_bytes()), Some(key * 2));
            }
        }));
    }

    // One writer outside that range.
    {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            for i in 1000..2000u64 {
                trie.insert(&i.to_be_bytes(), i * 2);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(trie.len(), 2000);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_removers_split_the_spoils() {
    let trie = Arc::new(Ctrie::new());
    for i in 0..8000u64 {
        trie.insert(&i.to_be_bytes(), i);
    }

    // All threads race to remove every key; each key must be won by
    // exactly one of them.
    let mut handles = vec![];
    for _ in 0..4 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            let mut won = 0u64;
            for i in 0..8000u64 {
                if trie.remove(&i.to_be_bytes()).is_some() {
                    won += 1;
                }
            }
            won
        }));
    }

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 8000);
    assert!(trie.is_empty());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_mixed_workload_randomized() {
    use rand::{Rng, SeedableRng};

    let trie = Arc::new(Ctrie::new());

    let mut handles = vec![];
    for t in 0..8u64 {
        let trie = trie.clone();
        handles.push(thread::spawn(move || {
            let mut rng = rand::rngs::StdRng::seed_from_u64(t);
            for _ in 0..5000 {
                let key = rng.gen_range(0..512u64).to_be_bytes();
                match rng.gen_range(0..3) {
                    0 => {
                        trie.insert(&key, t);
                    }
                    1 => {
                        let _ = trie.get(&key);
                    }
                    _ => {
                        let _ = trie.remove(&key);
                    }
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // The surviving entries must be internally consistent.
    let entries: Vec<_> = trie.iter().collect();
    assert_eq!(entries.len(), trie.len());
    for (key, _) in entries {
        assert!(trie.get(&key).is_some());
    }
}
