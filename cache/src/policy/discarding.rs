use super::EvictionPolicy;
use crate::entry::CacheEntry;

use std::sync::Arc;

/// A "no-op" queue installed when write expiration is not configured.
/// It tracks nothing and never evicts anything.
#[derive(Debug, Default)]
pub struct DiscardingQueue;

impl<K, V> EvictionPolicy<K, V> for DiscardingQueue
where
  K: Send + Sync,
  V: Send + Sync,
{
  fn write(&mut self, _entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    None
  }

  fn access(&mut self, _entry: &Arc<CacheEntry<K, V>>) {}

  fn remove(&mut self, _entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    None
  }

  fn iterate(&self, _visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) {}

  fn len(&self) -> usize {
    0
  }
}
