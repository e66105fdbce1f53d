use strata_cache::{BoxError, CacheBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Pretend this is a slow database lookup.
fn fetch_user_name(id: &u64) -> Result<String, BoxError> {
  thread::sleep(Duration::from_millis(200));
  if *id == 0 {
    return Err("user 0 does not exist".into());
  }
  Ok(format!("user-{}", id))
}

fn main() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::default()
    .maximum_size(1_000)
    .expire_after_access(Duration::from_secs(60))
    .record_stats()
    .build_with_loader({
      let calls = calls.clone();
      move |id: &u64| {
        calls.fetch_add(1, Ordering::SeqCst);
        fetch_user_name(id)
      }
    })
    .expect("Failed to build cache");

  // Ten threads ask for the same user at once; the lookup runs only once.
  thread::scope(|s| {
    for _ in 0..10 {
      s.spawn(|| {
        let name = cache.get(&42).expect("load should succeed");
        println!("Got {}", name);
      });
    }
  });
  println!("\nLoader calls for key 42: {}", calls.load(Ordering::SeqCst));

  match cache.get(&0) {
    Ok(name) => println!("Unexpected value: {}", name),
    Err(e) => println!("Load failed as expected: {}", e),
  }

  println!("\nCache stats: {:#?}", cache.stats());
}
