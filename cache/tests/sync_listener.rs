mod common;

use common::{next_removal, removal_channel};
use strata_cache::{Cache, CacheBuilder, RemovalCause};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::time::Duration;

#[test]
fn test_listener_for_capacity() {
  let (listener, rx) = removal_channel();
  let cache = CacheBuilder::default()
    .maximum_size(2)
    .shards(1)
    .removal_listener(listener)
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.put(2, "two".to_string());
  cache.put(3, "three".to_string());

  let (key, value, cause) = next_removal(&rx);
  assert_eq!(key, 1);
  assert_eq!(*value, "one");
  assert_eq!(cause, RemovalCause::Capacity);
  assert!(cause.was_evicted());
}

#[test]
fn test_listener_for_invalidation() {
  let (listener, rx) = removal_channel();
  let cache = CacheBuilder::default()
    .removal_listener(listener)
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.invalidate(&1);
  cache.invalidate(&1);

  let (key, value, cause) = next_removal(&rx);
  assert_eq!(key, 1);
  assert_eq!(*value, "one");
  assert_eq!(cause, RemovalCause::Invalidated);
  assert!(!cause.was_evicted());

  cache.run_pending_tasks();
  assert!(rx.try_recv().is_err(), "a second invalidate reports nothing");
}

#[test]
fn test_listener_for_invalidate_all() {
  let (listener, rx) = removal_channel();
  let cache = CacheBuilder::default()
    .removal_listener(listener)
    .build()
    .unwrap();

  for i in 0..4 {
    cache.put(i, i.to_string());
  }
  cache.invalidate_all();
  cache.run_pending_tasks();

  let mut keys: Vec<i32> = rx.try_iter().map(|(key, _, cause)| {
    assert_eq!(cause, RemovalCause::Invalidated);
    key
  }).collect();
  keys.sort();
  assert_eq!(keys, vec![0, 1, 2, 3]);
}

#[test]
fn test_listener_for_expiration_found_by_read() {
  let (listener, rx) = removal_channel();
  let cache = CacheBuilder::default()
    .expire_after_write(Duration::from_millis(50))
    .removal_listener(listener)
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.run_pending_tasks();
  std::thread::sleep(Duration::from_millis(100));
  assert!(cache.get_if_present(&1).is_none());

  let (key, _, cause) = next_removal(&rx);
  assert_eq!(key, 1);
  assert_eq!(cause, RemovalCause::Expired);
}

#[test]
fn test_insertion_listener() {
  let (tx, rx) = mpsc::channel();
  let tx = parking_lot::Mutex::new(tx);
  let cache = CacheBuilder::<i32, String>::new()
    .insertion_listener(move |key: &i32, value: Arc<String>| {
      let _ = tx.lock().send((*key, value));
    })
    .build()
    .unwrap();

  cache.put(1, "one".to_string());
  cache.put(1, "uno".to_string());
  cache.run_pending_tasks();

  let inserted: Vec<(i32, String)> = rx.try_iter().map(|(k, v)| (k, v.to_string())).collect();
  assert_eq!(inserted.len(), 2, "every write is reported");
  assert_eq!(inserted[1], (1, "uno".to_string()));
}

#[test]
fn test_panicking_listener_does_not_stop_processing() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<i32, i32>::new()
    .maximum_size(1)
    .removal_listener({
      let calls = calls.clone();
      move |key: &i32, _value: Arc<i32>, _cause: RemovalCause| {
        calls.fetch_add(1, Ordering::SeqCst);
        if *key == 1 {
          panic!("listener failure");
        }
      }
    })
    .build()
    .unwrap();

  cache.put(1, 1);
  cache.put(2, 2); // evicts 1, listener panics
  cache.put(3, 3); // evicts 2
  cache.run_pending_tasks();

  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(cache.count(), 1);
  assert!(cache.get_if_present(&3).is_some());
}

#[test]
fn test_listener_may_write_to_its_own_cache() {
  let slot: Arc<OnceLock<Cache<i32, i32>>> = Arc::new(OnceLock::new());
  let cache = CacheBuilder::<i32, i32>::new()
    .maximum_size(1)
    .removal_listener({
      let slot = slot.clone();
      move |key: &i32, value: Arc<i32>, _cause: RemovalCause| {
        // Runs on the processor thread; must not deadlock on a full buffer.
        if let Some(cache) = slot.get() {
          if *key < 10 {
            cache.put(*key + 10, *value);
          }
        }
      }
    })
    .build()
    .unwrap();
  let _ = slot.set(cache.clone());

  cache.put(1, 1);
  cache.put(2, 2); // evicts 1, listener writes 11
  // Each round flushes the writes the previous round's listener calls made.
  for _ in 0..3 {
    cache.run_pending_tasks();
  }

  assert_eq!(cache.count(), 1);
  assert_eq!(cache.get_if_present(&12).as_deref(), Some(&2));
}
