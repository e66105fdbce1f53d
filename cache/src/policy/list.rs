use crate::entry::CacheEntry;

use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K, V> {
  entry: Arc<CacheEntry<K, V>>,
  next: Option<Index>,
  prev: Option<Index>,
}

/// A doubly linked recency list of entries, stored in an arena.
///
/// Entries are looked up by identity (`CacheEntry::id`), never by key, so an
/// old entry and its replacement for the same key are tracked separately.
/// The node holds an `Arc` to its entry, which keeps the id from being
/// reused while the entry is listed.
#[derive(Debug)]
pub(crate) struct EntryList<K, V> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<usize, Index>,
  // Head is the most-recently-used item.
  head: Option<Index>,
  // Tail is the least-recently-used item.
  tail: Option<Index>,
}

impl<K, V> EntryList<K, V> {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Unlinks a node without removing it from the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev_idx) => self.nodes[prev_idx].next = next,
      None => self.head = next,
    }
    match next {
      Some(next_idx) => self.nodes[next_idx].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  #[inline]
  pub(crate) fn contains(&self, entry: &CacheEntry<K, V>) -> bool {
    self.lookup.contains_key(&entry.id())
  }

  /// Inserts the entry at the head, or moves it there if already listed.
  /// Returns true if the entry was newly inserted.
  pub(crate) fn push_front(&mut self, entry: &Arc<CacheEntry<K, V>>) -> bool {
    if self.move_to_front(entry) {
      return false;
    }
    let index = self.nodes.insert(Node {
      entry: entry.clone(),
      next: None,
      prev: None,
    });
    self.lookup.insert(entry.id(), index);
    self.link_front(index);
    true
  }

  /// Moves a listed entry to the head. Returns false if it is not listed.
  pub(crate) fn move_to_front(&mut self, entry: &CacheEntry<K, V>) -> bool {
    match self.lookup.get(&entry.id()).copied() {
      Some(index) => {
        if self.head != Some(index) {
          self.unlink(index);
          self.link_front(index);
        }
        true
      }
      None => false,
    }
  }

  pub(crate) fn remove(&mut self, entry: &CacheEntry<K, V>) -> Option<Arc<CacheEntry<K, V>>> {
    let index = self.lookup.remove(&entry.id())?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.entry)
  }

  /// The least-recently-used entry, if any.
  pub(crate) fn back(&self) -> Option<&Arc<CacheEntry<K, V>>> {
    self.tail.and_then(|index| self.nodes.get(index)).map(|node| &node.entry)
  }

  pub(crate) fn pop_back(&mut self) -> Option<Arc<CacheEntry<K, V>>> {
    let tail = self.tail?;
    let id = self.nodes[tail].entry.id();
    self.lookup.remove(&id);
    self.unlink(tail);
    self.nodes.remove(tail).map(|node| node.entry)
  }

  /// Iterates from the least- to the most-recently-used entry.
  pub(crate) fn iter_lru(&self) -> IterLru<'_, K, V> {
    IterLru {
      list: self,
      current: self.tail,
    }
  }

  /// Feeds entries to `visitor` from the tail until it returns false.
  /// Returns false if the visitor asked to stop.
  pub(crate) fn visit_lru(&self, visitor: &mut dyn FnMut(&Arc<CacheEntry<K, V>>) -> bool) -> bool {
    self.iter_lru().all(|entry| visitor(entry))
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K>
  where
    K: Clone,
  {
    let mut keys: Vec<K> = self.iter_lru().map(|entry| entry.key().clone()).collect();
    keys.reverse();
    keys
  }
}

pub(crate) struct IterLru<'a, K, V> {
  list: &'a EntryList<K, V>,
  current: Option<Index>,
}

impl<'a, K, V> Iterator for IterLru<'a, K, V> {
  type Item = &'a Arc<CacheEntry<K, V>>;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.list.nodes.get(self.current?)?;
    self.current = node.prev;
    Some(&node.entry)
  }
}
