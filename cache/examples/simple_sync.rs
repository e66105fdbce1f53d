use strata_cache::CacheBuilder;
use std::thread;
use std::time::Duration;

fn main() {
  // A cache of at most 100 items that forget anything not written for 5 seconds.
  let cache = CacheBuilder::default()
    .maximum_size(100)
    .expire_after_write(Duration::from_secs(5))
    .record_stats()
    .build()
    .expect("Failed to build cache");

  println!("Putting ('key1', 100) into the cache.");
  cache.put("key1".to_string(), 100);

  match cache.get_if_present("key1") {
    Some(value) => println!("Found value for key1: {}", value),
    None => println!("Value for key1 not found."),
  }

  println!("\nCache stats: {:#?}", cache.stats());

  println!("\nWaiting for 6 seconds for the item to expire...");
  thread::sleep(Duration::from_secs(6));

  match cache.get_if_present("key1") {
    Some(value) => println!("Found value for key1: {}", value),
    None => println!("Value for key1 not found (as expected after expiration)."),
  }

  println!("\nCache stats after expiration: {:#?}", cache.stats());
}
