#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use strata_cache::{Cache, CacheBuilder, RemovalCause};

// A custom hasher that hashes an integer key to itself, so tests can
// control which segment a key lands in.
// For a 4-segment cache:
// - key 0 -> segment 0
// - key 1 -> segment 1
// - key 4 -> segment 0
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, _: &[u8]) {
    unimplemented!()
  }
  fn write_i32(&mut self, i: i32) {
    self.0 = i as u64;
  }
}

pub fn build_test_cache(shards: usize) -> Cache<i32, String, ShardControllingHasher> {
  CacheBuilder::new()
    .shards(shards)
    .hasher(ShardControllingHasher)
    .build()
    .unwrap()
}

/// A removal notification as captured by `removal_channel`.
pub type Removal = (i32, Arc<String>, RemovalCause);

/// A removal listener that forwards every notification to a channel.
pub fn removal_channel() -> (
  impl Fn(&i32, Arc<String>, RemovalCause) + Send + Sync + 'static,
  mpsc::Receiver<Removal>,
) {
  let (tx, rx) = mpsc::channel();
  let tx = parking_lot::Mutex::new(tx);
  let listener = move |key: &i32, value: Arc<String>, cause: RemovalCause| {
    let _ = tx.lock().send((*key, value, cause));
  };
  (listener, rx)
}

/// Receives the next removal, failing the test after a generous timeout.
pub fn next_removal(rx: &mpsc::Receiver<Removal>) -> Removal {
  rx.recv_timeout(Duration::from_secs(2))
    .expect("expected a removal notification")
}
