//! Ordering queues that rank entries for eviction and expiration.
//!
//! A policy is only ever mutated by the cache's maintenance thread, so
//! implementations need no internal locking.

pub mod discarding;
pub mod lru;
pub mod recency;
pub mod slru;
pub mod tinylfu;

pub(crate) mod list;

use crate::entry::CacheEntry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The name of the policy used when none is configured.
pub const DEFAULT_POLICY: &str = "lru";

/// The cache's key index, as seen by an eviction policy.
pub trait BackingIndex<K, V>: Send + Sync {
  /// Removes `entry` from the index and marks it deleted.
  ///
  /// Returns false if it had already been removed by another path.
  fn discard(&self, entry: &Arc<CacheEntry<K, V>>) -> bool;

  /// The number of entries in the index.
  fn len(&self) -> usize;
}

/// Everything a policy receives when it is created.
pub struct PolicyContext<K, V> {
  /// The index the policy must excise capacity victims from.
  pub index: Arc<dyn BackingIndex<K, V>>,
  /// The maximum number of entries. `0` means unbounded.
  pub capacity: u64,
}

impl<K, V> Clone for PolicyContext<K, V> {
  fn clone(&self) -> Self {
    Self {
      index: self.index.clone(),
      capacity: self.capacity,
    }
  }
}

impl<K, V> fmt::Debug for PolicyContext<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PolicyContext")
      .field("capacity", &self.capacity)
      .finish_non_exhaustive()
  }
}

/// A trait for implementing the ordering queues behind the cache.
///
/// Entries move through `unranked -> ranked -> removed`. The cache calls
/// these methods from a single maintenance thread, in the order the
/// corresponding operations were announced.
pub trait EvictionPolicy<K, V>: Send {
  /// Ranks a newly written entry, or re-ranks an existing one.
  ///
  /// If the policy is now over capacity it must pick its least-favored
  /// entry, discard it from the backing index and return it.
  fn write(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>>;

  /// Records a cache hit on a ranked entry.
  fn access(&mut self, entry: &Arc<CacheEntry<K, V>>);

  /// Stops tracking `entry`, returning it if it was ranked.
  fn remove(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>>;

  /// Walks entries from least- to most-favored until `visitor` returns false.
  ///
  /// Expiration relies on this order following last-access (or write)
  /// time closely enough to stop at the first live entry.
  fn iterate(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool);

  /// The number of ranked entries.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A named constructor for an eviction policy.
pub type PolicyConstructor<K, V> =
  Arc<dyn Fn(PolicyContext<K, V>) -> Box<dyn EvictionPolicy<K, V>> + Send + Sync>;

/// A registry of eviction policies by name.
///
/// Comes with `lru`, `slru` and `tinylfu`. An empty name resolves to
/// [`DEFAULT_POLICY`].
pub struct PolicyRegistry<K, V> {
  constructors: HashMap<String, PolicyConstructor<K, V>>,
}

impl<K, V> PolicyRegistry<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub fn new() -> Self {
    let mut registry = Self {
      constructors: HashMap::new(),
    };
    registry.register("lru", |ctx| Box::new(lru::LruPolicy::new(ctx)));
    registry.register("slru", |ctx| Box::new(slru::SlruPolicy::new(ctx)));
    registry.register("tinylfu", |ctx| Box::new(tinylfu::TinyLfuPolicy::new(ctx)));
    registry
  }

  /// Registers (or replaces) the policy constructor for `name`.
  pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
  where
    F: Fn(PolicyContext<K, V>) -> Box<dyn EvictionPolicy<K, V>> + Send + Sync + 'static,
  {
    self.constructors.insert(name.into(), Arc::new(constructor));
  }

  pub fn contains(&self, name: &str) -> bool {
    self.constructors.contains_key(Self::resolve(name))
  }

  /// Builds the policy registered under `name`.
  pub fn create(&self, name: &str, ctx: PolicyContext<K, V>) -> Option<Box<dyn EvictionPolicy<K, V>>> {
    self
      .constructors
      .get(Self::resolve(name))
      .map(|constructor| constructor(ctx))
  }

  /// The registered names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  #[inline]
  fn resolve(name: &str) -> &str {
    if name.is_empty() {
      DEFAULT_POLICY
    } else {
      name
    }
  }
}

impl<K, V> Default for PolicyRegistry<K, V>
where
  K: Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> fmt::Debug for PolicyRegistry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<&String> = self.constructors.keys().collect();
    names.sort_unstable();
    f.debug_struct("PolicyRegistry").field("names", &names).finish()
  }
}


#[cfg(test)]
mod tests {
  use super::test_utils::context;
  use super::*;

  #[test]
  fn registry_has_builtin_policies() {
    let registry = PolicyRegistry::<i32, i32>::new();
    assert_eq!(registry.names(), vec!["lru", "slru", "tinylfu"]);
    assert!(registry.contains(""), "empty name resolves to the default");
    assert!(!registry.contains("fifo"));
  }

  #[test]
  fn registry_creates_registered_policy() {
    let mut registry = PolicyRegistry::<i32, i32>::new();
    registry.register("unbounded", |ctx| {
      Box::new(lru::LruPolicy::new(PolicyContext { capacity: 0, ..ctx }))
    });

    let (_, ctx) = context(1);
    let mut policy = registry.create("unbounded", ctx).expect("registered");
    for key in 0..10 {
      assert!(policy.write(&test_utils::entry(key)).is_none());
    }
    assert_eq!(policy.len(), 10);
  }

  #[test]
  fn registry_rejects_unknown_name() {
    let registry = PolicyRegistry::<i32, i32>::new();
    let (_, ctx) = context(1);
    assert!(registry.create("clock", ctx).is_none());
  }
}
