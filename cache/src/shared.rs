use crate::entry::CacheEntry;
use crate::segment::SegmentMap;
use crate::stats::StatsCounter;
use crate::task::processor::Event;
use crate::task::ticker::Ticker;
use crate::time::{self, Expiry};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use fibre::mpsc;
use tracing::warn;

/// The internal, thread-safe core shared by all handles of one cache.
///
/// The processor thread holds no reference to this struct, so
/// dropping the last handle drops the event sender and lets it exit.
pub(crate) struct CacheShared<K: Send + Sync, V: Send + Sync, H> {
  pub(crate) map: Arc<SegmentMap<K, V, H>>,
  pub(crate) sender: mpsc::BoundedSender<Event<K, V>>,
  pub(crate) processor_thread: ThreadId,
  pub(crate) ticker: Option<Ticker>,
  pub(crate) closing: AtomicBool,
  pub(crate) expiry: Expiry,
  pub(crate) capacity: u64,
  pub(crate) stats: Arc<dyn StatsCounter>,
}

impl<K: Send + Sync, V: Send + Sync, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("capacity", &self.capacity)
      .field("expiry", &self.expiry)
      .field("closing", &self.closing.load(Ordering::Relaxed))
      .field("stats", &self.stats.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K: Send + Sync, V: Send + Sync, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    self.closing.store(true, Ordering::Release);
    if let Some(ticker) = self.ticker.take() {
      ticker.stop();
    }
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Send + Sync,
  V: Send + Sync,
  H: BuildHasher + Clone,
{
  #[inline]
  pub(crate) fn is_closing(&self) -> bool {
    self.closing.load(Ordering::Acquire)
  }

  #[inline]
  fn on_processor_thread(&self) -> bool {
    thread::current().id() == self.processor_thread
  }

  /// Queues an event for the processor.
  ///
  /// Blocks while the buffer is full, except on the processor thread itself
  /// (a listener calling back into the cache), where the event is dropped
  /// rather than deadlocking.
  pub(crate) fn send(&self, event: Event<K, V>) {
    if self.is_closing() {
      return;
    }
    if self.on_processor_thread() {
      if self.sender.try_send(event).is_err() {
        warn!("cache event buffer full on the processor thread, dropping event");
      }
      return;
    }
    let _ = self.sender.send(event);
  }

  /// Queues an access event. Like every other event it waits for room, so
  /// the access order the processor sees is the order reads happened in.
  #[inline]
  pub(crate) fn send_access(&self, entry: Arc<CacheEntry<K, V>>) {
    self.send(Event::Access(entry));
  }

  /// Returns the live value for `key`, without touching the stats.
  ///
  /// A dead entry found on the way is removed from the map and handed to
  /// the processor for detaching.
  pub(crate) fn get_live<Q>(&self, key: &Q, hash: u64) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let entry = self.map.get(key, hash)?;
    // A placeholder is never a hit.
    let value = entry.value()?;
    let now = time::now_nanos();
    if self.expiry.is_expired(&entry, now) {
      self.map.discard(&entry);
      self.send(Event::Delete(Some(entry)));
      return None;
    }
    self.expiry.record_access(&entry, now);
    self.send_access(entry);
    Some(value)
  }

  /// Blocks until the processor has handled every event queued before the
  /// call.
  pub(crate) fn run_pending_tasks(&self) {
    if self.is_closing() || self.on_processor_thread() {
      return;
    }
    let (reply, done) = mpsc::bounded(1);
    if self.sender.send(Event::Barrier(reply)).is_ok() {
      let _ = done.recv();
    }
  }

  pub(crate) fn close(&self) {
    if self.closing.swap(true, Ordering::AcqRel) {
      return;
    }
    if let Some(ticker) = &self.ticker {
      ticker.stop();
    }
  }
}
