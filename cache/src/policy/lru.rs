use super::list::EntryList;
use super::{BackingIndex, EvictionPolicy, PolicyContext};
use crate::entry::CacheEntry;

use std::fmt;
use std::sync::Arc;

/// An eviction policy that evicts the least recently used entries.
///
/// Every write and access moves the entry to the head of a single list, so
/// iteration from the tail is ordered by last access time.
pub struct LruPolicy<K, V> {
  list: EntryList<K, V>,
  capacity: u64,
  index: Arc<dyn BackingIndex<K, V>>,
}

impl<K, V> LruPolicy<K, V> {
  pub fn new(ctx: PolicyContext<K, V>) -> Self {
    Self {
      list: EntryList::new(),
      capacity: ctx.capacity,
      index: ctx.index,
    }
  }

  #[inline]
  fn is_over_capacity(&self) -> bool {
    self.capacity > 0 && self.list.len() as u64 > self.capacity
  }
}

impl<K, V> fmt::Debug for LruPolicy<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LruPolicy")
      .field("len", &self.list.len())
      .field("capacity", &self.capacity)
      .finish()
  }
}

impl<K, V> EvictionPolicy<K, V> for LruPolicy<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  /// A written entry becomes the most recently used.
  fn write(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.list.push_front(entry);
    if !self.is_over_capacity() {
      return None;
    }
    let victim = self.list.pop_back()?;
    self.index.discard(&victim);
    Some(victim)
  }

  fn access(&mut self, entry: &Arc<CacheEntry<K, V>>) {
    self.list.move_to_front(entry);
  }

  fn remove(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.list.remove(entry)
  }

  fn iterate(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) {
    self.list.visit_lru(visitor);
  }

  fn len(&self) -> usize {
    self.list.len()
  }
}
