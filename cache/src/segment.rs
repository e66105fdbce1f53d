use crate::entry::CacheEntry;
use crate::policy::BackingIndex;

use core::fmt;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

type Segment<K, V, H> = RwLock<HashMap<K, Arc<CacheEntry<K, V>>, H>>;

/// How long `discard` waits on an entry lock before checking for a loader.
const DISCARD_WAIT: Duration = Duration::from_millis(1);

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<Q: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &Q) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// The key index of the cache, partitioned into independently locked segments.
///
/// Lookups take a segment's read lock. The write lock is only taken to
/// create or remove an entry, which makes "does this key exist, if not
/// create it" atomic per key: at most one entry object is registered for a
/// key at any time.
pub(crate) struct SegmentMap<K, V, H> {
  segments: Box<[CachePadded<Segment<K, V, H>>]>,
  hasher: H,
}

impl<K, V, H> fmt::Debug for SegmentMap<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SegmentMap")
      .field("num_segments", &self.segments.len())
      .finish()
  }
}

impl<K, V, H> SegmentMap<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a map with `num_segments` segments, which must be a power of two.
  pub(crate) fn new(num_segments: usize, hasher: H) -> Self {
    debug_assert!(num_segments.is_power_of_two());
    let segments = (0..num_segments)
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>();

    Self {
      segments: segments.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn hash<Q>(&self, key: &Q) -> u64
  where
    K: Borrow<Q>,
    Q: Hash + ?Sized,
  {
    hash_key(&self.hasher, key)
  }

  #[inline]
  fn segment(&self, hash: u64) -> &Segment<K, V, H> {
    &self.segments[hash as usize & (self.segments.len() - 1)]
  }

  pub(crate) fn get<Q>(&self, key: &Q, hash: u64) -> Option<Arc<CacheEntry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.segment(hash).read().get(key).cloned()
  }

  /// Returns the entry registered for `key`, creating it if absent or
  /// deleted.
  ///
  /// When the key already exists and `value` is `Some`, the existing entry's
  /// value is replaced in place, unless the entry was invalidated: a write
  /// then registers a fresh entry and the old one is left to its pending
  /// `Delete`.
  pub(crate) fn get_or_create(
    &self,
    key: K,
    hash: u64,
    value: Option<Arc<V>>,
  ) -> Arc<CacheEntry<K, V>>
  where
    K: Clone,
  {
    let mut guard = self.segment(hash).write();
    // A deleted entry may still be mapped until its remover takes this
    // lock. It is replaced rather than revived.
    let writing = value.is_some();
    if let Some(existing) = guard
      .get(&key)
      .filter(|existing| !existing.is_deleted() && !(writing && existing.is_invalidated()))
    {
      if let Some(value) = value {
        existing.set_value(value);
      }
      return existing.clone();
    }
    let entry = Arc::new(CacheEntry::new(key.clone(), hash, value));
    guard.insert(key, entry.clone());
    entry
  }

  /// Removes `entry` from its segment, but only if the segment still maps
  /// the key to this very entry object.
  pub(crate) fn remove_entry(&self, entry: &Arc<CacheEntry<K, V>>) -> bool {
    let mut guard = self.segment(entry.hash()).write();
    match guard.get(entry.key()) {
      Some(current) if Arc::ptr_eq(current, entry) => {
        guard.remove(entry.key());
        true
      }
      _ => false,
    }
  }

  /// Marks `entry` deleted and removes it from the map.
  ///
  /// Returns false if another path already deleted it, or if a loader is
  /// running for it. The entry lock is held for the whole loader call, so
  /// this never waits on it; the loader either removes the entry itself on
  /// failure or replays a `Write` that retries the removal.
  pub(crate) fn discard(&self, entry: &Arc<CacheEntry<K, V>>) -> bool {
    let guard = loop {
      if let Some(guard) = entry.try_lock_for(DISCARD_WAIT) {
        break guard;
      }
      if entry.is_loading() {
        return false;
      }
    };
    if entry.is_deleted() {
      return false;
    }
    entry.mark_deleted(&guard);
    self.remove_entry(entry);
    true
  }

  /// The number of entries across all segments, placeholders included.
  pub(crate) fn len(&self) -> usize {
    self.segments.iter().map(|segment| segment.read().len()).sum()
  }

  /// Visits every entry, one segment read lock at a time.
  pub(crate) fn for_each(&self, mut visitor: impl FnMut(&Arc<CacheEntry<K, V>>)) {
    for segment in self.segments.iter() {
      let guard = segment.read();
      for entry in guard.values() {
        visitor(entry);
      }
    }
  }
}

impl<K, V, H> BackingIndex<K, V> for SegmentMap<K, V, H>
where
  K: Eq + Hash + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Clone + Send + Sync,
{
  fn discard(&self, entry: &Arc<CacheEntry<K, V>>) -> bool {
    SegmentMap::discard(self, entry)
  }

  fn len(&self) -> usize {
    SegmentMap::len(self)
  }
}
