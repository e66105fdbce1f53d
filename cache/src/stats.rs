use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Accumulates statistics during the operation of a cache.
///
/// Implementations must be thread-safe: hits and loads are recorded by
/// caller threads, evictions by the maintenance thread.
pub trait StatsCounter: Send + Sync {
  /// Records cache hits.
  fn record_hits(&self, count: u64);

  /// Records cache misses.
  fn record_misses(&self, count: u64);

  /// Records the successful load of a new entry.
  fn record_load_success(&self, load_time: Duration);

  /// Records the failed load of a new entry.
  fn record_load_error(&self, load_time: Duration);

  /// Records the removal of an entry by eviction or expiration.
  fn record_eviction(&self);

  /// Returns a snapshot of the counter's values.
  fn snapshot(&self) -> CacheStats;
}

/// A `StatsCounter` that does nothing. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatsCounter;

impl StatsCounter for NullStatsCounter {
  fn record_hits(&self, _count: u64) {}
  fn record_misses(&self, _count: u64) {}
  fn record_load_success(&self, _load_time: Duration) {}
  fn record_load_error(&self, _load_time: Duration) {}
  fn record_eviction(&self) {}

  fn snapshot(&self) -> CacheStats {
    CacheStats::default()
  }
}

/// A lock-free `StatsCounter` backed by cache-padded atomics.
#[derive(Debug, Default)]
pub struct AtomicStatsCounter {
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  load_successes: CachePadded<AtomicU64>,
  load_errors: CachePadded<AtomicU64>,
  // Nanoseconds.
  total_load_time: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
}

impl AtomicStatsCounter {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StatsCounter for AtomicStatsCounter {
  fn record_hits(&self, count: u64) {
    self.hits.fetch_add(count, Ordering::Relaxed);
  }

  fn record_misses(&self, count: u64) {
    self.misses.fetch_add(count, Ordering::Relaxed);
  }

  fn record_load_success(&self, load_time: Duration) {
    self.load_successes.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_time
      .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
  }

  fn record_load_error(&self, load_time: Duration) {
    self.load_errors.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_time
      .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
  }

  fn record_eviction(&self) {
    self.evictions.fetch_add(1, Ordering::Relaxed);
  }

  fn snapshot(&self) -> CacheStats {
    CacheStats {
      hit_count: self.hits.load(Ordering::Relaxed),
      miss_count: self.misses.load(Ordering::Relaxed),
      load_success_count: self.load_successes.load(Ordering::Relaxed),
      load_error_count: self.load_errors.load(Ordering::Relaxed),
      total_load_time: Duration::from_nanos(self.total_load_time.load(Ordering::Relaxed)),
      eviction_count: self.evictions.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time snapshot of a cache's statistics.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
  /// The number of times a lookup returned a cached value.
  pub hit_count: u64,
  /// The number of times a lookup found nothing usable.
  pub miss_count: u64,
  /// The number of loader calls that produced a value.
  pub load_success_count: u64,
  /// The number of loader calls that failed.
  pub load_error_count: u64,
  /// Time spent in the loader, successful or not.
  pub total_load_time: Duration,
  /// The number of entries removed by capacity or expiration.
  pub eviction_count: u64,
}

impl CacheStats {
  /// `hit_count + miss_count`.
  pub fn request_count(&self) -> u64 {
    self.hit_count.saturating_add(self.miss_count)
  }

  /// The ratio of hits to requests, `1.0` when there were no requests.
  pub fn hit_rate(&self) -> f64 {
    match self.request_count() {
      0 => 1.0,
      requests => self.hit_count as f64 / requests as f64,
    }
  }

  /// The ratio of misses to requests, `0.0` when there were no requests.
  pub fn miss_rate(&self) -> f64 {
    match self.request_count() {
      0 => 0.0,
      requests => self.miss_count as f64 / requests as f64,
    }
  }

  /// The total number of loader calls.
  pub fn load_count(&self) -> u64 {
    self.load_success_count.saturating_add(self.load_error_count)
  }

  /// The ratio of failed loads to all loads, `0.0` when nothing was loaded.
  pub fn load_error_rate(&self) -> f64 {
    match self.load_count() {
      0 => 0.0,
      loads => self.load_error_count as f64 / loads as f64,
    }
  }

  /// The average time spent loading a value.
  pub fn average_load_penalty(&self) -> Duration {
    match self.load_count() {
      0 => Duration::ZERO,
      loads => self.total_load_time / loads.min(u32::MAX as u64) as u32,
    }
  }
}

impl fmt::Debug for CacheStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStats")
      .field("hit_count", &self.hit_count)
      .field("miss_count", &self.miss_count)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate() * 100.0))
      .field("load_success_count", &self.load_success_count)
      .field("load_error_count", &self.load_error_count)
      .field("total_load_time", &self.total_load_time)
      .field("eviction_count", &self.eviction_count)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_stats_rates() {
    let stats = CacheStats::default();
    assert_eq!(stats.request_count(), 0);
    assert_eq!(stats.hit_rate(), 1.0);
    assert_eq!(stats.miss_rate(), 0.0);
    assert_eq!(stats.load_error_rate(), 0.0);
    assert_eq!(stats.average_load_penalty(), Duration::ZERO);
  }

  #[test]
  fn atomic_counter_accumulates() {
    let counter = AtomicStatsCounter::new();
    counter.record_hits(3);
    counter.record_misses(1);
    counter.record_load_success(Duration::from_millis(30));
    counter.record_load_error(Duration::from_millis(10));
    counter.record_eviction();

    let stats = counter.snapshot();
    assert_eq!(stats.hit_count, 3);
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.request_count(), 4);
    assert_eq!(stats.hit_rate(), 0.75);
    assert_eq!(stats.miss_rate(), 0.25);
    assert_eq!(stats.load_error_rate(), 0.5);
    assert_eq!(stats.average_load_penalty(), Duration::from_millis(20));
    assert_eq!(stats.eviction_count, 1);
  }

  #[test]
  fn null_counter_reports_nothing() {
    let counter = NullStatsCounter;
    counter.record_hits(10);
    counter.record_eviction();
    assert_eq!(counter.snapshot(), CacheStats::default());
  }
}
