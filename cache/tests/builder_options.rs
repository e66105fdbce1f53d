use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strata_cache::{CacheBuilder, CacheStats, StatsCounter};
use tracing::Dispatch;

/// A log sink the test can read back.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
  fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }
}

impl io::Write for SharedBuf {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

#[test]
fn test_log_dispatch_receives_processor_events() {
  let buf = SharedBuf::default();
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::TRACE)
    .with_ansi(false)
    .with_writer({
      let buf = buf.clone();
      move || buf.clone()
    })
    .finish();

  let cache = CacheBuilder::<i32, i32>::new()
    .log_dispatch(Dispatch::new(subscriber))
    .build()
    .unwrap();
  cache.put(1, 1);
  cache.invalidate_all();
  cache.run_pending_tasks();

  let logs = buf.contents();
  assert!(logs.contains("cache processor started"), "logs: {}", logs);
  assert!(logs.contains("invalidated all cache entries"), "logs: {}", logs);
}

/// Only counts hits and misses.
#[derive(Default)]
struct RequestCounter {
  hits: AtomicU64,
  misses: AtomicU64,
}

impl StatsCounter for RequestCounter {
  fn record_hits(&self, count: u64) {
    self.hits.fetch_add(count, Ordering::Relaxed);
  }

  fn record_misses(&self, count: u64) {
    self.misses.fetch_add(count, Ordering::Relaxed);
  }

  fn record_load_success(&self, _load_time: Duration) {}
  fn record_load_error(&self, _load_time: Duration) {}
  fn record_eviction(&self) {}

  fn snapshot(&self) -> CacheStats {
    CacheStats {
      hit_count: self.hits.load(Ordering::Relaxed),
      miss_count: self.misses.load(Ordering::Relaxed),
      ..CacheStats::default()
    }
  }
}

#[test]
fn test_custom_stats_counter() {
  let cache = CacheBuilder::<&'static str, i32>::new()
    .stats_counter(RequestCounter::default())
    .build()
    .unwrap();

  cache.put("a", 1);
  cache.get_if_present("a");
  cache.get_if_present("a");
  cache.get_if_present("b");

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 2);
  assert_eq!(stats.miss_count, 1);
  assert_eq!(stats.request_count(), 3);
  assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
}

#[test]
fn test_unbounded_by_default() {
  let cache = CacheBuilder::<u32, u32>::default().build().unwrap();
  for i in 0..5_000 {
    cache.put(i, i);
  }
  cache.run_pending_tasks();
  assert_eq!(cache.count(), 5_000);
}
