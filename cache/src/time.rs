use crate::entry::CacheEntry;

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all entry timestamps.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into nanoseconds since the cache's epoch.
#[inline]
pub(crate) fn instant_to_nanos(instant: Instant) -> u64 {
  instant.saturating_duration_since(*CACHE_EPOCH).as_nanos() as u64
}

/// The current time as nanoseconds since the epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  instant_to_nanos(Instant::now())
}

/// Returns true when more than `ttl` has passed between `stamp` and `now`.
#[inline]
pub(crate) fn has_elapsed(stamp: u64, now: u64, ttl: Duration) -> bool {
  now.saturating_sub(stamp) > ttl.as_nanos() as u64
}

/// The configured expiration durations, and the liveness check built on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Expiry {
  pub(crate) after_access: Option<Duration>,
  pub(crate) after_write: Option<Duration>,
}

impl Expiry {
  #[inline]
  pub(crate) fn is_enabled(&self) -> bool {
    self.after_access.is_some() || self.after_write.is_some()
  }

  /// An entry is dead once invalidated or past either configured duration.
  pub(crate) fn is_expired<K, V>(&self, entry: &CacheEntry<K, V>, now: u64) -> bool {
    if entry.is_invalidated() {
      return true;
    }
    if let Some(ttl) = self.after_access {
      if has_elapsed(entry.access_time(), now, ttl) {
        return true;
      }
    }
    match self.after_write {
      Some(ttl) => has_elapsed(entry.write_time(), now, ttl),
      None => false,
    }
  }

  /// Stamps the timestamps that matter for the configured expiration.
  #[inline]
  pub(crate) fn record_write<K, V>(&self, entry: &CacheEntry<K, V>, now: u64) {
    if self.after_access.is_some() {
      entry.set_access_time(now);
    }
    if self.after_write.is_some() {
      entry.set_write_time(now);
    }
  }

  #[inline]
  pub(crate) fn record_access<K, V>(&self, entry: &CacheEntry<K, V>, now: u64) {
    if self.after_access.is_some() {
      entry.set_access_time(now);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn has_elapsed_is_strict() {
    let ttl = Duration::from_nanos(100);
    assert!(!has_elapsed(1_000, 1_100, ttl));
    assert!(has_elapsed(1_000, 1_101, ttl));
    assert!(!has_elapsed(2_000, 1_000, ttl), "clock skew never expires");
  }

  #[test]
  fn expiry_checks_each_enabled_mode() {
    let entry: CacheEntry<i32, i32> = CacheEntry::new(1, 1, None);
    let expiry = Expiry {
      after_access: Some(Duration::from_nanos(10)),
      after_write: None,
    };
    expiry.record_write(&entry, 100);
    assert_eq!(entry.write_time(), 0, "write time is only kept for write expiry");
    assert!(!expiry.is_expired(&entry, 105));
    assert!(expiry.is_expired(&entry, 111));

    expiry.record_access(&entry, 110);
    assert!(!expiry.is_expired(&entry, 111));

    entry.invalidate();
    assert!(Expiry::default().is_expired(&entry, 0));
  }
}
