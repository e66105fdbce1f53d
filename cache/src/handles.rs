use crate::error::{BoxError, CacheError};
use crate::shared::CacheShared;
use crate::stats::CacheStats;
use crate::task::processor::Event;
use crate::time;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// The function a `LoadingCache` computes missing values with.
pub(crate) type Loader<K, V> = Arc<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>;

/// A thread-safe, manually populated cache.
///
/// Handles are cheap to clone and all clones share the same entries. The
/// background threads stop once the last handle is dropped.
#[derive(Debug)]
pub struct Cache<K: Send + Sync, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K: Send + Sync, V: Send + Sync, H> Clone for Cache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Returns the value for `key` if it is cached and live. Never loads.
  ///
  /// An expired or invalidated entry counts as a miss and is removed.
  pub fn get_if_present<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash = self.shared.map.hash(key);
    match self.shared.get_live(key, hash) {
      Some(value) => {
        self.shared.stats.record_hits(1);
        Some(value)
      }
      None => {
        self.shared.stats.record_misses(1);
        None
      }
    }
  }

  /// Associates `value` with `key`, replacing any previous value.
  pub fn put(&self, key: K, value: V) {
    let shared = &self.shared;
    let hash = shared.map.hash(&key);
    let value = Arc::new(value);
    let now = time::now_nanos();

    // A dead entry is not revived by a write; it is replaced.
    if let Some(existing) = shared.map.get(&key, hash) {
      if existing.value().is_some() && shared.expiry.is_expired(&existing, now) {
        if shared.map.discard(&existing) {
          shared.send(Event::Delete(Some(existing)));
        }
      }
    }

    // An `invalidate` landing between the check above and this call is
    // handled by `get_or_create`, which replaces an invalidated entry instead
    // of writing into it. One landing after it wins over this write.
    let entry = shared.map.get_or_create(key, hash, Some(value));
    shared.expiry.record_write(&entry, now);
    shared.send(Event::Write(entry));
  }

  /// Discards the entry for `key`, if any. Calling this again is harmless.
  pub fn invalidate<Q>(&self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash = self.shared.map.hash(key);
    if let Some(entry) = self.shared.map.get(key, hash) {
      entry.invalidate();
      self.shared.send(Event::Delete(Some(entry)));
    }
  }

  /// Discards every entry.
  pub fn invalidate_all(&self) {
    self.shared.map.for_each(|entry| entry.invalidate());
    self.shared.send(Event::Delete(None));
  }

  /// The number of entries in the index, including ones that are expired
  /// but not yet removed and ones still being loaded.
  pub fn count(&self) -> usize {
    self.shared.map.len()
  }

  /// Returns every live value, in no particular order.
  pub fn values(&self) -> Vec<Arc<V>> {
    let now = time::now_nanos();
    let mut values = Vec::new();
    self.shared.map.for_each(|entry| {
      if let Some(value) = entry.value() {
        if !self.shared.expiry.is_expired(entry, now) {
          values.push(value);
        }
      }
    });
    values
  }

  /// Returns a snapshot of the statistics recorded so far.
  pub fn stats(&self) -> CacheStats {
    self.shared.stats.snapshot()
  }

  /// Blocks until all bookkeeping queued before this call has been applied:
  /// evictions, removals and listener calls.
  ///
  /// Does nothing on a closed cache, or when called from a listener.
  pub fn run_pending_tasks(&self) {
    self.shared.run_pending_tasks();
  }

  /// Stops background maintenance. Later writes still update the index, but
  /// are no longer ranked, evicted or reported to listeners.
  pub fn close(&self) {
    self.shared.close();
  }
}

/// A cache that computes missing values with a loader function.
///
/// Dereferences to [`Cache`] for every operation that does not load.
pub struct LoadingCache<K: Send + Sync, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) cache: Cache<K, V, H>,
  pub(crate) loader: Loader<K, V>,
}

impl<K: Send + Sync, V: Send + Sync, H> Clone for LoadingCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      loader: self.loader.clone(),
    }
  }
}

impl<K: Send + Sync, V: Send + Sync, H> fmt::Debug for LoadingCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache")
      .field("shared", &self.cache.shared)
      .finish_non_exhaustive()
  }
}

impl<K: Send + Sync, V: Send + Sync, H> Deref for LoadingCache<K, V, H> {
  type Target = Cache<K, V, H>;

  fn deref(&self) -> &Self::Target {
    &self.cache
  }
}

impl<K, V, H> LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone,
{
  /// Returns the value for `key`, loading it if necessary.
  ///
  /// Concurrent calls for the same missing key run the loader once; the
  /// others wait and receive the same value or the same error. A failed
  /// load is not cached.
  pub fn get(&self, key: &K) -> Result<Arc<V>, CacheError> {
    let shared = &self.cache.shared;
    let hash = shared.map.hash(key);
    if let Some(value) = shared.get_live(key, hash) {
      shared.stats.record_hits(1);
      return Ok(value);
    }
    shared.stats.record_misses(1);
    self.load(key, hash)
  }

  fn load(&self, key: &K, hash: u64) -> Result<Arc<V>, CacheError> {
    let shared = &self.cache.shared;
    loop {
      let entry = shared.map.get_or_create(key.clone(), hash, None);
      let mut state = entry.lock();

      if let Some(error) = &state.failure {
        return Err(error.clone());
      }
      // Excised while we waited; retry against its successor.
      if entry.is_deleted() {
        continue;
      }

      let now = time::now_nanos();
      if let Some(value) = entry.value() {
        if !shared.expiry.is_expired(&entry, now) {
          drop(state);
          shared.expiry.record_access(&entry, now);
          shared.stats.record_hits(1);
          shared.send_access(entry);
          return Ok(value);
        }
        entry.mark_deleted(&state);
        shared.map.remove_entry(&entry);
        drop(state);
        shared.send(Event::Delete(Some(entry)));
        continue;
      }

      entry.set_loading(true);
      let start = Instant::now();
      let result = panic::catch_unwind(AssertUnwindSafe(|| (self.loader)(key)));
      let load_time = start.elapsed();
      entry.set_loading(false);

      let result = match result {
        Ok(result) => result,
        Err(payload) => {
          // Nothing is left behind; waiters and the next call load afresh.
          entry.mark_deleted(&state);
          shared.map.remove_entry(&entry);
          drop(state);
          shared.stats.record_load_error(load_time);
          panic::resume_unwind(payload);
        }
      };

      return match result {
        Ok(value) => {
          let value = Arc::new(value);
          entry.set_value(value.clone());
          shared.expiry.record_write(&entry, time::now_nanos());
          shared.stats.record_load_success(load_time);
          drop(state);
          shared.send(Event::Write(entry));
          Ok(value)
        }
        Err(error) => {
          let error = CacheError::from_loader(error);
          state.failure = Some(error.clone());
          entry.mark_deleted(&state);
          shared.map.remove_entry(&entry);
          drop(state);
          shared.stats.record_load_error(load_time);
          Err(error)
        }
      };
    }
  }
}
