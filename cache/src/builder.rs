use crate::error::{BoxError, BuildError};
use crate::handles::{Cache, LoadingCache};
use crate::listener::{InsertionListener, RemovalListener};
use crate::policy::discarding::DiscardingQueue;
use crate::policy::recency::RecencyQueue;
use crate::policy::{
  BackingIndex, EvictionPolicy, PolicyContext, PolicyRegistry, DEFAULT_POLICY,
};
use crate::segment::SegmentMap;
use crate::shared::CacheShared;
use crate::stats::{AtomicStatsCounter, NullStatsCounter, StatsCounter};
use crate::task::processor::{Processor, ProcessorContext, EVENT_BUFFER_SIZE};
use crate::task::ticker::{Ticker, DEFAULT_TICK_INTERVAL};
use crate::time::Expiry;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fibre::mpsc;
use tracing::{debug, dispatcher, Dispatch};

/// The largest maximum size a cache accepts. Larger values are clamped.
pub const MAXIMUM_CAPACITY: u64 = 1 << 30;

/// A builder for creating `Cache` and `LoadingCache` instances.
///
/// Every option is independent. A cache built with no options at all is
/// unbounded, never expires anything and keeps no statistics.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  maximum_size: u64,
  shards: usize,
  expire_after_access: Option<Duration>,
  expire_after_write: Option<Duration>,
  policy: String,
  registry: PolicyRegistry<K, V>,
  stats_counter: Option<Arc<dyn StatsCounter>>,
  removal_listener: Option<Arc<dyn RemovalListener<K, V>>>,
  insertion_listener: Option<Arc<dyn InsertionListener<K, V>>>,
  hasher: H,
  log_dispatch: Option<Dispatch>,
  maintenance_interval: Option<Duration>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("maximum_size", &self.maximum_size)
      .field("shards", &self.shards)
      .field("expire_after_access", &self.expire_after_access)
      .field("expire_after_write", &self.expire_after_write)
      .field("policy", &self.policy)
      .field("registry", &self.registry)
      .field("has_removal_listener", &self.removal_listener.is_some())
      .field("has_insertion_listener", &self.insertion_listener.is_some())
      .finish_non_exhaustive()
  }
}

// --- Default Constructor ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Default,
{
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      maximum_size: 0,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      expire_after_access: None,
      expire_after_write: None,
      policy: DEFAULT_POLICY.to_string(),
      registry: PolicyRegistry::new(),
      stats_counter: None,
      removal_listener: None,
      insertion_listener: None,
      hasher: H::default(),
      log_dispatch: None,
      maintenance_interval: None,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Sets the maximum number of entries. `0` (the default) means unbounded.
  ///
  /// Values above [`MAXIMUM_CAPACITY`] are clamped to it.
  pub fn maximum_size(mut self, size: u64) -> Self {
    self.maximum_size = size;
    self
  }

  /// Sets the number of concurrent segments of the key index.
  pub fn shards(mut self, shards: usize) -> Self {
    // Ensure shards is at least 1 and a power of two for fast bitwise ANDing.
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Expires entries once this long has passed since their last read or write.
  pub fn expire_after_access(mut self, duration: Duration) -> Self {
    self.expire_after_access = Some(duration);
    self
  }

  /// Expires entries once this long has passed since their last write.
  pub fn expire_after_write(mut self, duration: Duration) -> Self {
    self.expire_after_write = Some(duration);
    self
  }

  /// Selects the eviction policy by its registered name.
  ///
  /// Built in are `"lru"` (the default, also selected by `""`), `"slru"`
  /// and `"tinylfu"`. Building fails if no policy has this name.
  pub fn policy(mut self, name: impl Into<String>) -> Self {
    self.policy = name.into();
    self
  }

  /// Registers a custom eviction policy under `name`, replacing any
  /// policy of the same name. Select it with [`policy`](Self::policy).
  pub fn register_policy<F>(mut self, name: impl Into<String>, constructor: F) -> Self
  where
    F: Fn(PolicyContext<K, V>) -> Box<dyn EvictionPolicy<K, V>> + Send + Sync + 'static,
  {
    self.registry.register(name, constructor);
    self
  }

  /// Sets the sink for cache statistics.
  pub fn stats_counter<S>(mut self, counter: S) -> Self
  where
    S: StatsCounter + 'static,
  {
    self.stats_counter = Some(Arc::new(counter));
    self
  }

  /// Records statistics with an [`AtomicStatsCounter`].
  pub fn record_stats(self) -> Self {
    self.stats_counter(AtomicStatsCounter::new())
  }

  /// Sets the listener notified when entries are removed.
  pub fn removal_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: RemovalListener<K, V> + 'static,
  {
    self.removal_listener = Some(Arc::new(listener));
    self
  }

  /// Sets the listener notified when written entries are ranked.
  pub fn insertion_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: InsertionListener<K, V> + 'static,
  {
    self.insertion_listener = Some(Arc::new(listener));
    self
  }

  /// Sets the hasher for the key index.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Routes the cache's log events to `dispatch` instead of the global
  /// default subscriber.
  pub fn log_dispatch(mut self, dispatch: Dispatch) -> Self {
    self.log_dispatch = Some(dispatch);
    self
  }

  /// Sets the period of the background expiration tick.
  /// (Primarily for testing purposes).
  #[doc(hidden)]
  pub fn maintenance_interval(mut self, interval: Duration) -> Self {
    self.maintenance_interval = Some(interval);
    self
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a `Cache` that is populated manually.
  pub fn build(self) -> Result<Cache<K, V, H>, BuildError> {
    let shared = self.build_shared_core()?;
    Ok(Cache { shared })
  }

  /// Builds a `LoadingCache` that computes missing values with `loader`.
  ///
  /// The loader runs on the calling thread, at most once at a time per key.
  /// It must not read its own key from the same cache.
  pub fn build_with_loader<F>(self, loader: F) -> Result<LoadingCache<K, V, H>, BuildError>
  where
    F: Fn(&K) -> Result<V, BoxError> + Send + Sync + 'static,
  {
    let cache = self.build()?;
    Ok(LoadingCache {
      cache,
      loader: Arc::new(loader),
    })
  }

  /// Central logic to construct the shared core of the cache.
  fn build_shared_core(self) -> Result<Arc<CacheShared<K, V, H>>, BuildError> {
    let capacity = self.maximum_size.min(MAXIMUM_CAPACITY);
    let map = Arc::new(SegmentMap::new(self.shards, self.hasher.clone()));
    let index: Arc<dyn BackingIndex<K, V>> = map.clone();

    let access_queue = self
      .registry
      .create(
        &self.policy,
        PolicyContext {
          index: index.clone(),
          capacity,
        },
      )
      .ok_or_else(|| BuildError::UnknownPolicy(self.policy.clone()))?;

    let write_queue = write_queue_for(self.expire_after_write);

    let expiry = Expiry {
      after_access: self.expire_after_access,
      after_write: self.expire_after_write,
    };
    let stats = self
      .stats_counter
      .unwrap_or_else(|| Arc::new(NullStatsCounter));
    let tick_interval = self.maintenance_interval.unwrap_or(DEFAULT_TICK_INTERVAL);

    let processor = Processor::new(ProcessorContext {
      access_queue,
      write_queue,
      index,
      stats: stats.clone(),
      removal_listener: self.removal_listener,
      insertion_listener: self.insertion_listener,
      expiry,
      tick_interval,
    });

    let (sender, receiver) = mpsc::bounded(EVENT_BUFFER_SIZE);
    let processor_dispatch = self.log_dispatch.clone();
    let handle = thread::Builder::new()
      .name("strata-cache-processor".into())
      .spawn(move || match processor_dispatch {
        Some(dispatch) => dispatcher::with_default(&dispatch, || processor.run(receiver)),
        None => processor.run(receiver),
      })?;
    let processor_thread = handle.thread().id();

    let ticker = if expiry.is_enabled() {
      Some(Ticker::spawn(sender.clone(), tick_interval, self.log_dispatch)?)
    } else {
      None
    };

    debug!(
      capacity,
      policy = %self.policy,
      shards = self.shards,
      ?expiry,
      "cache built"
    );

    Ok(Arc::new(CacheShared {
      map,
      sender,
      processor_thread,
      ticker,
      closing: AtomicBool::new(false),
      expiry,
      capacity,
      stats,
    }))
  }
}

/// Write order is only tracked when it can expire something.
fn write_queue_for<K, V>(expire_after_write: Option<Duration>) -> Box<dyn EvictionPolicy<K, V>>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  match expire_after_write {
    Some(_) => Box::new(RecencyQueue::new()),
    None => Box::new(DiscardingQueue),
  }
}
