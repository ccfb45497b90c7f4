use petek_trie::Ctrie;

#[test]
fn test_insert_and_get() {
    let trie = Ctrie::new();
    assert_eq!(trie.insert(b"a", 1), None);
    assert_eq!(trie.insert(b"b", 2), None);
    assert_eq!(trie.get(b"a"), Some(1));
    assert_eq!(trie.get(b"b"), Some(2));
    assert_eq!(trie.get(b"c"), None);
}

#[test]
fn test_insert_replace() {
    let trie = Ctrie::new();
    assert_eq!(trie.insert(b"k", 10), None);
    assert_eq!(trie.insert(b"k", 20), Some(10));
    assert_eq!(trie.insert(b"k", 30), Some(20));
    assert_eq!(trie.get(b"k"), Some(30));
    assert_eq!(trie.len(), 1);
}

#[test]
fn test_remove() {
    let trie = Ctrie::new();
    trie.insert(b"one", 100);
    trie.insert(b"two", 200);

    assert_eq!(trie.remove(b"one"), Some(100));
    assert_eq!(trie.get(b"one"), None);
    assert_eq!(trie.remove(b"one"), None);
    assert_eq!(trie.get(b"two"), Some(200));
}

#[test]
fn test_remove_missing_from_empty() {
    let trie: Ctrie<u64> = Ctrie::new();
    assert_eq!(trie.remove(b"nothing"), None);
    assert_eq!(trie.get(b"nothing"), None);
}

#[test]
fn test_contains_key() {
    let trie = Ctrie::new();
    trie.insert(b"hello", "world");
    assert!(trie.contains_key(b"hello"));
    assert!(!trie.contains_key(b"goodbye"));
}

#[test]
fn test_len_and_is_empty() {
    let trie = Ctrie::new();
    assert!(trie.is_empty());
    assert_eq!(trie.len(), 0);

    trie.insert(b"a", 1);
    trie.insert(b"b", 2);
    assert!(!trie.is_empty());
    assert_eq!(trie.len(), 2);

    trie.remove(b"a");
    assert_eq!(trie.len(), 1);
}

#[test]
fn test_clear() {
    let trie = Ctrie::new();
    for i in 0..100u64 {
        trie.insert(&i.to_be_bytes(), i * 10);
    }
    assert_eq!(trie.len(), 100);

    trie.clear();
    assert!(trie.is_empty());
    for i in 0..100u64 {
        assert_eq!(trie.get(&i.to_be_bytes()), None);
    }
}

#[test]
fn test_empty_key() {
    let trie = Ctrie::new();
    assert_eq!(trie.insert(b"", 7), None);
    assert_eq!(trie.get(b""), Some(7));
    assert_eq!(trie.remove(b""), Some(7));
    assert_eq!(trie.get(b""), None);
}

#[test]
fn test_keys_are_compared_by_bytes() {
    let trie = Ctrie::new();
    trie.insert(b"ab", 1);
    trie.insert(b"abc", 2);
    trie.insert(&[0xab], 3);
    assert_eq!(trie.get(b"ab"), Some(1));
    assert_eq!(trie.get(b"abc"), Some(2));
    assert_eq!(trie.get(&[0xab]), Some(3));
    assert_eq!(trie.len(), 3);
}

#[test]
fn test_many_keys() {
    let trie = Ctrie::new();
    for i in 0..10_000u64 {
        assert_eq!(trie.insert(&i.to_be_bytes(), i), None);
    }
    assert_eq!(trie.len(), 10_000);
    for i in 0..10_000u64 {
        assert_eq!(trie.get(&i.to_be_bytes()), Some(i));
    }
    for i in 0..10_000u64 {
        assert_eq!(trie.remove(&i.to_be_bytes()), Some(i));
    }
    assert!(trie.is_empty());
}

#[test]
fn test_iter_yields_all_entries() {
    let trie = Ctrie::new();
    for i in 0..500u64 {
        trie.insert(&i.to_be_bytes(), i * 3);
    }

    let mut seen: Vec<(Box<[u8]>, u64)> = trie.iter().collect();
    assert_eq!(seen.len(), 500);
    seen.sort();
    for (i, (key, value)) in seen.iter().enumerate() {
        assert_eq!(&key[..], &(i as u64).to_be_bytes());
        assert_eq!(*value, i as u64 * 3);
    }
}

#[test]
fn test_keys_iterator() {
    let trie = Ctrie::new();
    trie.insert(b"x", 1);
    trie.insert(b"y", 2);

    let mut keys: Vec<Box<[u8]>> = trie.keys().collect();
    keys.sort();
    assert_eq!(keys, vec![b"x".to_vec().into(), b"y".to_vec().into()]);
}

#[test]
fn test_insert_remove_interleaved() {
    let trie = Ctrie::new();
    for round in 0..10u64 {
        for i in 0..200u64 {
            trie.insert(&i.to_be_bytes(), round * 1000 + i);
        }
        for i in (0..200u64).step_by(2) {
            assert_eq!(trie.remove(&i.to_be_bytes()), Some(round * 1000 + i));
        }
        for i in (1..200u64).step_by(2) {
            assert_eq!(trie.get(&i.to_be_bytes()), Some(round * 1000 + i));
        }
        for i in (1..200u64).step_by(2) {
            trie.remove(&i.to_be_bytes());
        }
        assert!(trie.is_empty());
    }
}
