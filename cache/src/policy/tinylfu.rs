use super::list::EntryList;
use super::slru::SlruState;
use super::{BackingIndex, EvictionPolicy, PolicyContext};
use crate::entry::CacheEntry;

use std::fmt;
use std::sync::Arc;

/// A policy that implements the W-TinyLFU scheme.
///
/// New entries land in a small LRU "window". When the window overflows, its
/// LRU entry becomes a candidate for the SLRU "main" space and is admitted
/// only if a frequency sketch estimates it to be at least as popular as the
/// main space's next victim. Whichever loses is evicted.
pub struct TinyLfuPolicy<K, V> {
  window: EntryList<K, V>,
  main: SlruState<K, V>,
  sketch: cms::CountMinSketch,
  window_capacity: u64,
  main_capacity: u64,
  index: Arc<dyn BackingIndex<K, V>>,
}

impl<K, V> TinyLfuPolicy<K, V> {
  pub fn new(ctx: PolicyContext<K, V>) -> Self {
    let capacity = ctx.capacity;
    let (window_capacity, main_capacity) = if capacity == 0 {
      (0, u64::MAX)
    } else {
      // The window is ~1% of the total cache, the main space the other 99%.
      let window = ((capacity as f64 * 0.01).round() as u64).max(1);
      (window, capacity.saturating_sub(window))
    };
    let sketch_capacity = capacity.clamp(1, 1 << 24) as usize;

    Self {
      window: EntryList::new(),
      main: SlruState::new(if capacity == 0 { 0 } else { main_capacity }),
      sketch: cms::CountMinSketch::new((sketch_capacity * 10).max(100)),
      window_capacity,
      main_capacity,
      index: ctx.index,
    }
  }

  // Moves window overflow into the main space. Returns the entry that lost
  // the admission contest, if any.
  fn drain_window(&mut self) -> Option<Arc<CacheEntry<K, V>>> {
    let mut evicted = None;
    while self.window.len() as u64 > self.window_capacity {
      let candidate = self.window.pop_back()?;
      if (self.main.len() as u64) < self.main_capacity {
        self.main.admit(&candidate);
        continue;
      }
      let victim = match self.main.peek_victim() {
        Some(victim) => victim.clone(),
        None => {
          // Main has no room at all; the candidate cannot be kept.
          evicted = Some(candidate);
          continue;
        }
      };
      if self.sketch.estimate(candidate.hash()) >= self.sketch.estimate(victim.hash()) {
        self.main.remove(&victim);
        self.main.admit(&candidate);
        evicted = Some(victim);
      } else {
        evicted = Some(candidate);
      }
    }
    evicted
  }
}

impl<K, V> fmt::Debug for TinyLfuPolicy<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TinyLfuPolicy")
      .field("window", &self.window.len())
      .field("main", &self.main.len())
      .field("window_capacity", &self.window_capacity)
      .field("main_capacity", &self.main_capacity)
      .finish()
  }
}

impl<K, V> EvictionPolicy<K, V> for TinyLfuPolicy<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  fn write(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.sketch.increment(entry.hash());

    // An update of an entry already in the main space is just an access.
    if self.main.contains(entry) {
      self.main.access(entry);
      return None;
    }

    self.window.push_front(entry);
    let evicted = self.drain_window()?;
    self.index.discard(&evicted);
    Some(evicted)
  }

  fn access(&mut self, entry: &Arc<CacheEntry<K, V>>) {
    self.sketch.increment(entry.hash());
    if !self.window.move_to_front(entry) {
      self.main.access(entry);
    }
  }

  fn remove(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.window.remove(entry).or_else(|| self.main.remove(entry))
  }

  fn iterate(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) {
    if self.window.visit_lru(visitor) {
      self.main.visit(visitor);
    }
  }

  fn len(&self) -> usize {
    self.window.len() + self.main.len()
  }
}

mod cms {
  use std::hash::{BuildHasher, Hash, Hasher};

  const DEPTH: usize = 4;

  /// A count-min sketch over precomputed key hashes.
  ///
  /// Counters are halved once `reset_threshold` increments have been
  /// recorded, so old popularity decays.
  #[derive(Debug)]
  pub(super) struct CountMinSketch {
    counters: Vec<Vec<u32>>,
    hashers: Vec<ahash::RandomState>,
    increments: usize,
    reset_threshold: usize,
  }

  impl CountMinSketch {
    pub fn new(reset_threshold: usize) -> Self {
      let width = (reset_threshold * 2 / DEPTH).max(256).next_power_of_two();
      let counters = (0..DEPTH).map(|_| vec![0u32; width]).collect();
      let hashers = (0..DEPTH).map(|_| ahash::RandomState::new()).collect();
      Self {
        counters,
        hashers,
        increments: 0,
        reset_threshold,
      }
    }

    #[inline]
    fn slot(&self, row: usize, hash: u64) -> usize {
      let mut hasher = self.hashers[row].build_hasher();
      hash.hash(&mut hasher);
      hasher.finish() as usize & (self.counters[row].len() - 1)
    }

    pub fn increment(&mut self, hash: u64) {
      for row in 0..DEPTH {
        let slot = self.slot(row, hash);
        let counter = &mut self.counters[row][slot];
        *counter = counter.saturating_add(1);
      }
      self.increments += 1;
      if self.increments >= self.reset_threshold {
        self.reset();
      }
    }

    pub fn estimate(&self, hash: u64) -> u32 {
      (0..DEPTH)
        .map(|row| self.counters[row][self.slot(row, hash)])
        .min()
        .unwrap_or(0)
    }

    fn reset(&mut self) {
      self.increments = 0;
      for row in &mut self.counters {
        for counter in row {
          *counter /= 2;
        }
      }
    }
  }

  #[cfg(test)]
  mod tests {
    use super::*;

    #[test]
    fn estimate_tracks_increments() {
      let mut sketch = CountMinSketch::new(1000);
      for _ in 0..5 {
        sketch.increment(42);
      }
      sketch.increment(7);
      assert!(sketch.estimate(42) >= 5);
      assert!(sketch.estimate(7) >= 1);
    }

    #[test]
    fn reset_halves_counters() {
      let mut sketch = CountMinSketch::new(8);
      for _ in 0..8 {
        sketch.increment(1);
      }
      assert_eq!(sketch.estimate(1), 4);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::policy::test_utils::{context, entry};

  #[test]
  fn new_item_goes_to_window() {
    let (_, ctx) = context(101);
    let mut policy = TinyLfuPolicy::new(ctx);
    let a = entry(1);

    assert!(policy.write(&a).is_none());
    assert!(policy.window.contains(&a), "Item should be in window");
    assert!(!policy.main.contains(&a));
  }

  #[test]
  fn window_overflow_moves_candidate_to_main_with_room() {
    let (index, ctx) = context(101); // window=1, main=100
    let mut policy = TinyLfuPolicy::new(ctx);
    let (a, b) = (entry(1), entry(2));

    policy.write(&a);
    assert!(policy.write(&b).is_none());
    assert!(policy.window.contains(&b));
    assert!(policy.main.probationary.contains(&a));
    assert!(index.discarded.lock().is_empty());
  }

  #[test]
  fn window_overflow_rejects_infrequent_candidate() {
    let (index, ctx) = context(2); // window=1, main=1
    let mut policy = TinyLfuPolicy::new(ctx);
    let (hot, cold, newcomer) = (entry(100), entry(1), entry(2));

    // Make `hot` the main victim and much more frequent.
    policy.write(&hot);
    policy.write(&cold); // hot moves to main
    for _ in 0..10 {
      policy.access(&hot);
    }

    let evicted = policy.write(&newcomer).expect("capacity exceeded");
    assert!(Arc::ptr_eq(&evicted, &cold), "cold candidate loses admission");
    assert_eq!(*index.discarded.lock(), vec![1]);
    assert!(policy.main.contains(&hot));
    assert!(policy.window.contains(&newcomer));
    assert_eq!(policy.len(), 2);
  }

  #[test]
  fn window_overflow_admits_frequent_candidate() {
    let (_, ctx) = context(2); // window=1, main=1
    let mut policy = TinyLfuPolicy::new(ctx);
    let (victim, candidate, newcomer) = (entry(100), entry(1), entry(2));

    policy.write(&victim);
    policy.write(&candidate); // victim moves to main
    for _ in 0..10 {
      policy.access(&candidate);
    }

    let evicted = policy.write(&newcomer).expect("capacity exceeded");
    assert!(Arc::ptr_eq(&evicted, &victim));
    assert!(policy.main.contains(&candidate));
  }

  #[test]
  fn rewrite_of_main_entry_is_an_access() {
    let (_, ctx) = context(101);
    let mut policy = TinyLfuPolicy::new(ctx);
    let (a, b) = (entry(1), entry(2));
    policy.write(&a);
    policy.write(&b); // a moves to main probation

    assert!(policy.write(&a).is_none());
    assert!(policy.main.protected.contains(&a), "re-write promotes like a hit");
  }

  #[test]
  fn remove_finds_window_and_main() {
    let (_, ctx) = context(101);
    let mut policy = TinyLfuPolicy::new(ctx);
    let (a, b) = (entry(1), entry(2));
    policy.write(&a);
    policy.write(&b);

    assert!(policy.remove(&a).is_some());
    assert!(policy.remove(&b).is_some());
    assert!(policy.is_empty());
  }
}
