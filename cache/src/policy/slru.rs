use super::list::EntryList;
use super::{BackingIndex, EvictionPolicy, PolicyContext};
use crate::entry::CacheEntry;

use std::fmt;
use std::sync::Arc;

/// Splits a capacity into (probationary, protected) shares, 20/80.
/// A zero capacity leaves both segments unbounded.
pub(crate) fn split_capacity(capacity: u64) -> (u64, u64) {
  if capacity == 0 {
    return (u64::MAX, u64::MAX);
  }
  let prob_capacity = ((capacity as f64 * 0.20).round() as u64).max(1);
  (prob_capacity, capacity.saturating_sub(prob_capacity))
}

/// The two segments of SLRU. Also embedded as the main space of TinyLFU.
pub(crate) struct SlruState<K, V> {
  pub(crate) probationary: EntryList<K, V>,
  pub(crate) protected: EntryList<K, V>,
  prot_capacity: u64,
}

impl<K, V> SlruState<K, V> {
  pub(crate) fn new(capacity: u64) -> Self {
    let (_, prot_capacity) = split_capacity(capacity);
    Self {
      probationary: EntryList::new(),
      protected: EntryList::new(),
      prot_capacity,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.probationary.len() + self.protected.len()
  }

  pub(crate) fn contains(&self, entry: &CacheEntry<K, V>) -> bool {
    self.probationary.contains(entry) || self.protected.contains(entry)
  }

  // Demotes protected's LRU entries back to probation while it is too big.
  fn maintain_capacities(&mut self) {
    while self.protected.len() as u64 > self.prot_capacity {
      match self.protected.pop_back() {
        Some(entry) => {
          self.probationary.push_front(&entry);
        }
        None => break,
      }
    }
  }

  /// New entries enter probation. Listed entries are refreshed in place.
  pub(crate) fn admit(&mut self, entry: &Arc<CacheEntry<K, V>>) {
    if !self.protected.move_to_front(entry) {
      self.probationary.push_front(entry);
    }
  }

  /// A hit promotes a probationary entry into the protected segment.
  pub(crate) fn access(&mut self, entry: &Arc<CacheEntry<K, V>>) {
    if self.protected.move_to_front(entry) {
      return;
    }
    if let Some(entry) = self.probationary.remove(entry) {
      self.protected.push_front(&entry);
      self.maintain_capacities();
    }
  }

  pub(crate) fn remove(&mut self, entry: &CacheEntry<K, V>) -> Option<Arc<CacheEntry<K, V>>> {
    self
      .probationary
      .remove(entry)
      .or_else(|| self.protected.remove(entry))
  }

  /// The entry that would be evicted next.
  pub(crate) fn peek_victim(&self) -> Option<&Arc<CacheEntry<K, V>>> {
    self.probationary.back().or_else(|| self.protected.back())
  }

  pub(crate) fn pop_victim(&mut self) -> Option<Arc<CacheEntry<K, V>>> {
    self
      .probationary
      .pop_back()
      .or_else(|| self.protected.pop_back())
  }

  /// Probation first, then protected, each from its LRU end.
  pub(crate) fn visit(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) -> bool {
    self.probationary.visit_lru(visitor) && self.protected.visit_lru(visitor)
  }
}

/// An eviction policy based on the Segmented LRU algorithm.
/// It maintains a probationary and a protected segment to resist cache scans.
pub struct SlruPolicy<K, V> {
  state: SlruState<K, V>,
  capacity: u64,
  index: Arc<dyn BackingIndex<K, V>>,
}

impl<K, V> SlruPolicy<K, V> {
  pub fn new(ctx: PolicyContext<K, V>) -> Self {
    Self {
      state: SlruState::new(ctx.capacity),
      capacity: ctx.capacity,
      index: ctx.index,
    }
  }
}

impl<K, V> fmt::Debug for SlruPolicy<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlruPolicy")
      .field("probationary", &self.state.probationary.len())
      .field("protected", &self.state.protected.len())
      .field("capacity", &self.capacity)
      .finish()
  }
}

impl<K, V> EvictionPolicy<K, V> for SlruPolicy<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  fn write(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.state.admit(entry);
    if self.capacity == 0 || self.state.len() as u64 <= self.capacity {
      return None;
    }
    let victim = self.state.pop_victim()?;
    self.index.discard(&victim);
    Some(victim)
  }

  fn access(&mut self, entry: &Arc<CacheEntry<K, V>>) {
    self.state.access(entry);
  }

  fn remove(&mut self, entry: &Arc<CacheEntry<K, V>>) -> Option<Arc<CacheEntry<K, V>>> {
    self.state.remove(entry)
  }

  fn iterate(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) {
    self.state.visit(visitor);
  }

  fn len(&self) -> usize {
    self.state.len()
  }
}
