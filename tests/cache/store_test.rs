//! Capped entry list behaviour.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use replysmith::cache::{CacheEntry, CacheMetadata, CacheStore, MAX_CACHE_ENTRIES};
use replysmith::storage::{save_typed, KeyValueStore, MemoryStore, CACHE_ENTRIES_KEY};

fn entry(key: &str, minutes: i64, embedding: Option<Vec<f32>>) -> CacheEntry {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid date");
    CacheEntry {
        key: key.to_owned(),
        prompt: format!("prompt {key}"),
        response: format!("response {key}"),
        embedding,
        metadata: CacheMetadata {
            timestamp: base + Duration::minutes(minutes),
            model: "mock-model".to_owned(),
            temperature: Some(0.7),
            max_tokens: Some(500),
        },
    }
}

fn memory() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

#[test]
fn entries_are_kept_newest_first() {
    let cache = CacheStore::new(memory());
    cache.insert(entry("a", 1, None)).expect("insert");
    cache.insert(entry("c", 3, None)).expect("insert");
    cache.insert(entry("b", 2, None)).expect("insert");

    let keys: Vec<String> = cache.entries().expect("entries").into_iter().map(|e| e.key).collect();
    assert_eq!(keys, ["c", "b", "a"]);
}

#[test]
fn reinserting_a_key_replaces_it() {
    let cache = CacheStore::new(memory());
    cache.insert(entry("a", 1, None)).expect("insert");
    let mut newer = entry("a", 5, None);
    newer.response = "fresh".to_owned();
    cache.insert(newer).expect("insert");

    let entries = cache.entries().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response, "fresh");
}

#[test]
fn overflow_drops_oldest_by_timestamp() {
    let cache = CacheStore::with_capacity(memory(), 3);
    for (i, key) in ["k0", "k1", "k2"].iter().enumerate() {
        let minutes = i64::try_from(i).expect("small index").saturating_add(10);
        cache.insert(entry(key, minutes, None)).expect("insert");
    }
    // Older than every stored entry, so it is the one evicted.
    cache.insert(entry("ancient", 0, None)).expect("insert");

    let keys: Vec<String> = cache.entries().expect("entries").into_iter().map(|e| e.key).collect();
    assert_eq!(keys, ["k2", "k1", "k0"]);
}

#[test]
fn default_capacity_is_one_thousand() {
    let store = memory();
    let full: Vec<CacheEntry> = (0..MAX_CACHE_ENTRIES)
        .rev()
        .map(|i| {
            let minutes = i64::try_from(i).expect("fits").saturating_add(1);
            entry(&format!("k{i}"), minutes, None)
        })
        .collect();
    save_typed(store.as_ref(), CACHE_ENTRIES_KEY, &full).expect("seed");

    let cache = CacheStore::new(Arc::clone(&store));
    cache.insert(entry("newest", 100_000, None)).expect("insert");

    let entries = cache.entries().expect("entries");
    assert_eq!(entries.len(), MAX_CACHE_ENTRIES);
    assert_eq!(entries[0].key, "newest");
    assert!(entries.iter().all(|e| e.key != "k0"), "oldest entry should be evicted");
}

#[test]
fn nearest_honours_threshold_and_prefers_first_of_ties() {
    let cache = CacheStore::new(memory());
    cache.insert(entry("older", 1, Some(vec![1.0, 0.0]))).expect("insert");
    cache.insert(entry("newer", 2, Some(vec![1.0, 0.0]))).expect("insert");
    cache.insert(entry("plain", 3, None)).expect("insert");

    let (hit, score) = cache
        .nearest(&[1.0, 0.0], 0.85)
        .expect("lookup")
        .expect("hit");
    assert_eq!(hit.key, "newer");
    assert!((score - 1.0).abs() < 1e-9);

    assert!(cache.nearest(&[0.0, 1.0], 0.85).expect("lookup").is_none());
}

#[test]
fn stats_and_clear() {
    let cache = CacheStore::new(memory());
    assert_eq!(cache.stats().expect("stats").entries, 0);

    cache.insert(entry("a", 1, Some(vec![0.5]))).expect("insert");
    cache.insert(entry("b", 9, None)).expect("insert");
    let stats = cache.stats().expect("stats");
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.with_embedding, 1);
    assert!(stats.oldest < stats.newest);

    cache.clear().expect("clear");
    assert!(cache.entries().expect("entries").is_empty());
}
