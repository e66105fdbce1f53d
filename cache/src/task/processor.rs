use crate::entry::CacheEntry;
use crate::listener::{InsertionListener, RemovalCause, RemovalListener};
use crate::policy::{BackingIndex, EvictionPolicy};
use crate::stats::StatsCounter;
use crate::time::{self, Expiry};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use fibre::mpsc;
use tracing::{debug, error, trace};

/// The capacity of the event channel between cache handles and the processor.
pub(crate) const EVENT_BUFFER_SIZE: usize = 256;

/// The maximum number of entries removed by one expiration sweep.
const DRAIN_MAX: usize = 16;

/// The number of processed reads after which a sweep runs.
const DRAIN_THRESHOLD: usize = 64;

/// A record of something a cache handle did, replayed by the processor.
pub(crate) enum Event<K, V> {
  /// An entry was created or its value replaced.
  Write(Arc<CacheEntry<K, V>>),
  /// An entry was read.
  Access(Arc<CacheEntry<K, V>>),
  /// An entry should be removed, or every entry when `None`.
  Delete(Option<Arc<CacheEntry<K, V>>>),
  /// Periodic wake-up from the ticker.
  Tick,
  /// Acknowledged once every earlier event has been processed.
  Barrier(mpsc::BoundedSender<()>),
}

/// Everything the processor needs besides the event stream.
pub(crate) struct ProcessorContext<K, V> {
  pub(crate) access_queue: Box<dyn EvictionPolicy<K, V>>,
  pub(crate) write_queue: Box<dyn EvictionPolicy<K, V>>,
  pub(crate) index: Arc<dyn BackingIndex<K, V>>,
  pub(crate) stats: Arc<dyn StatsCounter>,
  pub(crate) removal_listener: Option<Arc<dyn RemovalListener<K, V>>>,
  pub(crate) insertion_listener: Option<Arc<dyn InsertionListener<K, V>>>,
  pub(crate) expiry: Expiry,
  pub(crate) tick_interval: Duration,
}

/// The single consumer of cache events and the only owner of the ordering
/// queues.
pub(crate) struct Processor<K, V> {
  ctx: ProcessorContext<K, V>,
  reads: usize,
  last_sweep: u64,
}

impl<K, V> Processor<K, V>
where
  K: Send + Sync,
  V: Send + Sync,
{
  pub(crate) fn new(ctx: ProcessorContext<K, V>) -> Self {
    Self {
      ctx,
      reads: 0,
      last_sweep: time::now_nanos(),
    }
  }

  /// Consumes events until every sender has been dropped.
  ///
  /// A panic while handling an event (usually from a listener) is logged and
  /// processing resumes with the next event.
  pub(crate) fn run(mut self, receiver: mpsc::BoundedReceiver<Event<K, V>>) {
    debug!("cache processor started");
    loop {
      let result = panic::catch_unwind(AssertUnwindSafe(|| self.drain(&receiver)));
      match result {
        Ok(()) => break,
        Err(payload) => {
          error!(panic = %panic_message(payload.as_ref()), "cache processor panicked, restarting");
        }
      }
    }
    debug!("cache processor stopped");
  }

  fn drain(&mut self, receiver: &mpsc::BoundedReceiver<Event<K, V>>) {
    while let Ok(event) = receiver.recv() {
      self.handle(event);
    }
  }

  pub(crate) fn handle(&mut self, event: Event<K, V>) {
    match event {
      Event::Write(entry) => self.on_write(entry),
      Event::Access(entry) => self.on_access(entry),
      Event::Delete(Some(entry)) => {
        let cause = cause_of(&entry);
        self.remove(&entry, cause);
        self.post_read_cleanup();
      }
      Event::Delete(None) => self.remove_all(),
      Event::Tick => {
        let interval = self.ctx.tick_interval;
        if self.ctx.expiry.is_enabled()
          && time::now_nanos().saturating_sub(self.last_sweep) > interval.as_nanos() as u64
        {
          self.expire_entries();
        }
      }
      Event::Barrier(reply) => {
        let _ = reply.try_send(());
      }
    }
  }

  fn on_write(&mut self, entry: Arc<CacheEntry<K, V>>) {
    // Removed or invalidated before this write was replayed; it must not be
    // ranked. Whichever of this and the `Delete` runs first reports it.
    if entry.is_deleted() {
      return;
    }
    if entry.is_invalidated() {
      self.remove(&entry, RemovalCause::Invalidated);
      return;
    }

    let evicted = self.ctx.access_queue.write(&entry);
    self.ctx.write_queue.write(&entry);

    if let Some(listener) = &self.ctx.insertion_listener {
      if let Some(value) = entry.value() {
        listener.on_insert(entry.key(), value);
      }
    }

    // A victim still held by a loader stays mapped; its loader's `Write`
    // ranks it again.
    if let Some(victim) = evicted.filter(|victim| victim.is_deleted()) {
      self.ctx.write_queue.remove(&victim);
      self.ctx.stats.record_eviction();
      self.notify(&victim, RemovalCause::Capacity);
    }

    self.post_write_cleanup();
  }

  fn on_access(&mut self, entry: Arc<CacheEntry<K, V>>) {
    if !entry.is_deleted() {
      self.ctx.access_queue.access(&entry);
    }
    self.post_read_cleanup();
  }

  fn post_read_cleanup(&mut self) {
    self.reads += 1;
    if self.reads >= DRAIN_THRESHOLD {
      self.reads = 0;
      self.expire_entries();
    }
  }

  fn post_write_cleanup(&mut self) {
    self.reads = 0;
    self.expire_entries();
  }

  /// Detaches `entry` from both queues and the index, then notifies.
  ///
  /// Returns false if some earlier removal already took care of it, in
  /// which case nobody is notified.
  fn remove(&mut self, entry: &Arc<CacheEntry<K, V>>, cause: RemovalCause) -> bool {
    let in_access = self.ctx.access_queue.remove(entry).is_some();
    let in_write = self.ctx.write_queue.remove(entry).is_some();
    let discarded = self.ctx.index.discard(entry);

    // A ranked entry a reader already excised is reported here. One a loader
    // still holds is reported when its `Write` is replayed.
    if !(discarded || ((in_access || in_write) && entry.is_deleted())) {
      return false;
    }
    if cause.was_evicted() {
      self.ctx.stats.record_eviction();
    }
    self.notify(entry, cause);
    true
  }

  fn remove_all(&mut self) {
    let mut entries = Vec::with_capacity(self.ctx.access_queue.len());
    self.ctx.access_queue.iterate(&mut |entry| {
      entries.push(entry.clone());
      true
    });
    // Entries only ever ranked by write order.
    self.ctx.write_queue.iterate(&mut |entry| {
      entries.push(entry.clone());
      true
    });

    let mut removed = 0usize;
    for entry in &entries {
      if self.remove(entry, RemovalCause::Invalidated) {
        removed += 1;
      }
    }
    debug!(removed, "invalidated all cache entries");
  }

  /// Removes up to `DRAIN_MAX` dead entries from the least-favored end of
  /// each queue, stopping at the first live entry.
  pub(crate) fn expire_entries(&mut self) {
    let expiry = self.ctx.expiry;
    if !expiry.is_enabled() {
      return;
    }
    let now = time::now_nanos();
    self.last_sweep = now;

    let mut victims: Vec<Arc<CacheEntry<K, V>>> = Vec::new();
    let mut collect = |entry: &Arc<CacheEntry<K, V>>| {
      if victims.len() >= DRAIN_MAX || !expiry.is_expired(entry, now) {
        return false;
      }
      victims.push(entry.clone());
      true
    };
    if expiry.after_access.is_some() {
      self.ctx.access_queue.iterate(&mut collect);
    }
    if expiry.after_write.is_some() {
      self.ctx.write_queue.iterate(&mut collect);
    }

    let mut removed = 0usize;
    for victim in victims {
      // An access replayed after the scan may have revived it.
      if !expiry.is_expired(&victim, time::now_nanos()) {
        continue;
      }
      if self.remove(&victim, cause_of(&victim)) {
        removed += 1;
      }
    }
    if removed > 0 {
      trace!(removed, "expired cache entries");
    }
  }

  fn notify(&self, entry: &CacheEntry<K, V>, cause: RemovalCause) {
    if let Some(listener) = &self.ctx.removal_listener {
      if let Some(value) = entry.value() {
        listener.on_removal(entry.key(), value, cause);
      }
    }
  }
}

#[inline]
fn cause_of<K, V>(entry: &CacheEntry<K, V>) -> RemovalCause {
  if entry.is_invalidated() {
    RemovalCause::Invalidated
  } else {
    RemovalCause::Expired
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "unknown panic"
  }
}
