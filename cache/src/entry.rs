use crate::error::CacheError;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};

/// State protected by an entry's private lock.
#[derive(Debug, Default)]
pub(crate) struct LoadState {
  /// The error of a failed load, shared with every caller that waited on it.
  pub(crate) failure: Option<CacheError>,
}

/// A record in the cache, holding the value and all bookkeeping metadata.
///
/// Entries are owned jointly by the segment map and the ordering queues of
/// the eviction policy. Policies only ever see them through a shared
/// reference; the mutating operations are crate-private.
pub struct CacheEntry<K, V> {
  key: K,
  hash: u64,
  /// `None` means the value is still being loaded.
  value: RwLock<Option<Arc<V>>>,
  access_time: AtomicU64,
  write_time: AtomicU64,
  invalidated: AtomicBool,
  loading: AtomicBool,
  /// Only ever set while holding `state`.
  deleted: AtomicBool,
  state: Mutex<LoadState>,
}

impl<K, V> CacheEntry<K, V> {
  pub(crate) fn new(key: K, hash: u64, value: Option<Arc<V>>) -> Self {
    Self {
      key,
      hash,
      value: RwLock::new(value),
      access_time: AtomicU64::new(0),
      write_time: AtomicU64::new(0),
      invalidated: AtomicBool::new(false),
      loading: AtomicBool::new(false),
      deleted: AtomicBool::new(false),
      state: Mutex::new(LoadState::default()),
    }
  }

  /// The key this entry was created for.
  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// The precomputed hash of the key.
  #[inline]
  pub fn hash(&self) -> u64 {
    self.hash
  }

  /// An identity for this entry object, stable for as long as it is alive.
  ///
  /// Two entries for the same key (a superseded one and its successor) have
  /// different ids, which is what ordering queues key their lookups on.
  #[inline]
  pub fn id(&self) -> usize {
    self as *const Self as usize
  }

  /// Returns a clone of the value, or `None` while it is being loaded.
  #[inline]
  pub fn value(&self) -> Option<Arc<V>> {
    self.value.read().clone()
  }

  #[inline]
  pub(crate) fn set_value(&self, value: Arc<V>) {
    *self.value.write() = Some(value);
  }

  /// Last access timestamp in nanoseconds, 0 if access expiration is off.
  #[inline]
  pub fn access_time(&self) -> u64 {
    self.access_time.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn set_access_time(&self, nanos: u64) {
    self.access_time.store(nanos, Ordering::Relaxed);
  }

  /// Last write timestamp in nanoseconds, 0 if write expiration is off.
  #[inline]
  pub fn write_time(&self) -> u64 {
    self.write_time.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn set_write_time(&self, nanos: u64) {
    self.write_time.store(nanos, Ordering::Relaxed);
  }

  #[inline]
  pub fn is_invalidated(&self) -> bool {
    self.invalidated.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn invalidate(&self) {
    self.invalidated.store(true, Ordering::Release);
  }

  /// True while a loader call for this entry is running.
  #[inline]
  pub fn is_loading(&self) -> bool {
    self.loading.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn set_loading(&self, loading: bool) {
    self.loading.store(loading, Ordering::Release);
  }

  /// True once the entry has been removed from the segment map.
  #[inline]
  pub fn is_deleted(&self) -> bool {
    self.deleted.load(Ordering::Acquire)
  }

  /// Marks the entry deleted. The caller must hold the guard from `lock`.
  #[inline]
  pub(crate) fn mark_deleted(&self, _guard: &MutexGuard<'_, LoadState>) {
    self.deleted.store(true, Ordering::Release);
  }

  /// Acquires the entry's private lock.
  ///
  /// This is held across a loader call, so concurrent loads of one key
  /// queue up here. It must be taken before any segment lock.
  #[inline]
  pub(crate) fn lock(&self) -> MutexGuard<'_, LoadState> {
    self.state.lock()
  }

  /// Like `lock`, but gives up after `timeout`.
  #[inline]
  pub(crate) fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, LoadState>> {
    self.state.try_lock_for(timeout)
  }
}

impl<K: fmt::Debug, V> fmt::Debug for CacheEntry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("key", &self.key)
      .field("hash", &self.hash)
      .field("has_value", &self.value.read().is_some())
      .field("access_time", &self.access_time())
      .field("write_time", &self.write_time())
      .field("invalidated", &self.is_invalidated())
      .field("loading", &self.is_loading())
      .field("deleted", &self.is_deleted())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_entry_without_value_is_placeholder() {
    let entry: CacheEntry<i32, String> = CacheEntry::new(1, 7, None);
    assert!(entry.value().is_none());
    assert_eq!(entry.hash(), 7);
    assert!(!entry.is_deleted());
    assert!(!entry.is_invalidated());
  }

  #[test]
  fn ids_differ_between_entries_for_the_same_key() {
    let a: CacheEntry<i32, i32> = CacheEntry::new(1, 1, None);
    let b: CacheEntry<i32, i32> = CacheEntry::new(1, 1, None);
    assert_ne!(a.id(), b.id());
  }

  #[test]
  fn mark_deleted_requires_lock() {
    let entry: CacheEntry<i32, i32> = CacheEntry::new(1, 1, Some(Arc::new(5)));
    {
      let guard = entry.lock();
      entry.mark_deleted(&guard);
    }
    assert!(entry.is_deleted());
    assert_eq!(entry.value().as_deref(), Some(&5));
  }
}
