use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
  /// The entry was evicted because the cache exceeded its maximum size.
  Capacity,
  /// The entry outlived its expire-after-access or expire-after-write duration.
  Expired,
  /// The entry was removed by `invalidate` or `invalidate_all`.
  Invalidated,
}

impl RemovalCause {
  /// True if the cache removed the entry on its own, rather than by request.
  pub fn was_evicted(&self) -> bool {
    matches!(self, RemovalCause::Capacity | RemovalCause::Expired)
  }
}

impl fmt::Display for RemovalCause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RemovalCause::Capacity => write!(f, "evicted due to capacity"),
      RemovalCause::Expired => write!(f, "evicted due to expiration"),
      RemovalCause::Invalidated => write!(f, "manually invalidated"),
    }
  }
}

/// A listener that is notified when an entry leaves the cache.
///
/// Called on the cache's maintenance thread, so it should return quickly.
/// A panic inside the listener is caught and logged; the event that
/// triggered it is lost but the cache keeps running.
pub trait RemovalListener<K, V>: Send + Sync {
  fn on_removal(&self, key: &K, value: Arc<V>, cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
  F: Fn(&K, Arc<V>, RemovalCause) + Send + Sync,
{
  fn on_removal(&self, key: &K, value: Arc<V>, cause: RemovalCause) {
    self(key, value, cause)
  }
}

/// A listener that is notified when a written entry is ranked by the cache.
///
/// Called on the cache's maintenance thread.
pub trait InsertionListener<K, V>: Send + Sync {
  fn on_insert(&self, key: &K, value: Arc<V>);
}

impl<K, V, F> InsertionListener<K, V> for F
where
  F: Fn(&K, Arc<V>) + Send + Sync,
{
  fn on_insert(&self, key: &K, value: Arc<V>) {
    self(key, value)
  }
}
