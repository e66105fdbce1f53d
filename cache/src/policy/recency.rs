use super::list::EntryList;
use super::EvictionPolicy;
use crate::entry::CacheEntry;

use std::sync::Arc;

/// The write-order queue used for expire-after-write.
///
/// Orders entries by their last write. It never evicts and ignores reads.
#[derive(Debug)]
pub struct RecencyQueue<K, V> {
  list: EntryList<K, V>,
}

impl<K, V> RecencyQueue<K, V> {
  pub fn new() -> Self {
    Self {
      list: EntryList::new(),
    }
  }
}

impl<K, V> Default for RecencyQueue<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> EvictionPolicy<K, V> for RecencyQueue<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  fn write(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.list.push_front(entry);
    None
  }

  fn access(&mut self, _entry: &Arc<CacheEntry<K, V>>) {}

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
