use strata_cache::{CacheBuilder, RemovalCause, RemovalListener};
use std::sync::Arc;

// A simple listener that just prints removed entries.
struct MyListener;

impl RemovalListener<i32, String> for MyListener {
  fn on_removal(&self, key: &i32, value: Arc<String>, cause: RemovalCause) {
    println!(
      "[Listener] Item removed! Key: {}, Value: '{}', Cause: {}",
      key, value, cause
    );
  }
}

fn main() {
  println!("--- Cache with the SLRU Policy and a Removal Listener ---");

  let cache = CacheBuilder::default()
    .maximum_size(3) // A small capacity to easily trigger evictions
    .policy("slru")
    .removal_listener(MyListener)
    .build()
    .expect("Failed to build cache");

  cache.put(1, "one".to_string());
  cache.put(2, "two".to_string());
  cache.put(3, "three".to_string());
  cache.run_pending_tasks();
  println!("\nPut keys 1, 2, 3. Cache is full with {} entries.", cache.count());

  // A hit moves key 1 into the protected segment.
  println!("\nAccessing key 1 to protect it...");
  cache.get_if_present(&1);
  cache.run_pending_tasks();

  println!("\nPutting key 4. This will trigger an eviction.");
  cache.put(4, "four".to_string());
  cache.run_pending_tasks();

  // Probation holds 2 and 3 in insertion order, so 2 goes first.
  assert!(cache.get_if_present(&1).is_some(), "Key 1 should be present (was accessed)");
  assert!(cache.get_if_present(&2).is_none(), "Key 2 should have been evicted");
  assert!(cache.get_if_present(&3).is_some());
  assert!(cache.get_if_present(&4).is_some());

  println!("\nInvalidating key 3 explicitly.");
  cache.invalidate(&3);
  cache.run_pending_tasks();
  println!("Final count: {}", cache.count());
}
