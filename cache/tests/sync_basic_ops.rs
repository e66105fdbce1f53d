mod common;

use common::build_test_cache;
use strata_cache::CacheBuilder;

#[test]
fn test_put_and_get() {
  let cache = build_test_cache(4);
  cache.put(1, "one".to_string());

  assert_eq!(cache.get_if_present(&1).as_deref().map(String::as_str), Some("one"));
  assert!(cache.get_if_present(&2).is_none());
  assert_eq!(cache.count(), 1);
}

#[test]
fn test_put_replaces_value() {
  let cache = build_test_cache(4);
  cache.put(1, "one".to_string());
  cache.put(1, "uno".to_string());
  cache.run_pending_tasks();

  assert_eq!(*cache.get_if_present(&1).unwrap(), "uno");
  assert_eq!(cache.count(), 1);
}

#[test]
fn test_get_with_borrowed_key() {
  let cache = CacheBuilder::<String, u32>::new().build().unwrap();
  cache.put("answer".to_string(), 42);
  assert_eq!(cache.get_if_present("answer").as_deref(), Some(&42));
}

#[test]
fn test_invalidate_is_idempotent() {
  let cache = build_test_cache(4);
  cache.put(1, "one".to_string());
  cache.put(2, "two".to_string());

  cache.invalidate(&1);
  assert!(cache.get_if_present(&1).is_none());
  cache.invalidate(&1);
  assert!(cache.get_if_present(&1).is_none());

  cache.run_pending_tasks();
  assert_eq!(cache.count(), 1);
  assert!(cache.get_if_present(&2).is_some());
}

#[test]
fn test_put_after_invalidate_creates_fresh_entry() {
  let cache = build_test_cache(4);
  cache.put(1, "one".to_string());
  cache.invalidate(&1);
  cache.put(1, "again".to_string());
  cache.run_pending_tasks();

  assert_eq!(*cache.get_if_present(&1).unwrap(), "again");
}

#[test]
fn test_invalidate_all() {
  let cache = build_test_cache(4);
  for i in 0..10 {
    cache.put(i, i.to_string());
  }
  cache.invalidate_all();

  for i in 0..10 {
    assert!(cache.get_if_present(&i).is_none());
  }
  cache.run_pending_tasks();
  assert_eq!(cache.count(), 0);

  cache.put(3, "three".to_string());
  assert!(cache.get_if_present(&3).is_some());
}

#[test]
fn test_values() {
  let cache = build_test_cache(2);
  for i in 0..5 {
    cache.put(i, format!("v{}", i));
  }
  cache.invalidate(&0);

  let mut values: Vec<String> = cache.values().iter().map(|v| v.to_string()).collect();
  values.sort();
  assert_eq!(values, vec!["v1", "v2", "v3", "v4"]);
}

#[test]
fn test_stats() {
  let cache = CacheBuilder::<i32, String>::new()
    .record_stats()
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.get_if_present(&1);
  cache.get_if_present(&1);
  cache.get_if_present(&2);

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 2);
  assert_eq!(stats.miss_count, 1);
  assert_eq!(stats.request_count(), 3);
}

#[test]
fn test_stats_are_off_by_default() {
  let cache = build_test_cache(1);
  cache.put(1, "one".to_string());
  cache.get_if_present(&1);
  assert_eq!(cache.stats().hit_count, 0);
}

#[test]
fn test_clones_share_entries() {
  let cache = build_test_cache(4);
  let other = cache.clone();
  cache.put(7, "seven".to_string());
  assert!(other.get_if_present(&7).is_some());
}

#[test]
fn test_closed_cache_still_serves_reads() {
  let cache = build_test_cache(4);
  cache.put(1, "one".to_string());
  cache.close();
  cache.close();

  assert!(cache.get_if_present(&1).is_some());
  // Returns immediately once closed.
  cache.run_pending_tasks();
}

#[test]
fn test_concurrent_puts() {
  let cache = CacheBuilder::<i32, i32>::new().build().unwrap();
  std::thread::scope(|s| {
    for t in 0..8 {
      let cache = &cache;
      s.spawn(move || {
        for i in 0..250 {
          cache.put(t * 1000 + i, i);
        }
      });
    }
  });
  cache.run_pending_tasks();
  assert_eq!(cache.count(), 2000);
}
