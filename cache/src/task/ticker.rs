use super::processor::Event;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fibre::mpsc;
use tracing::{debug, dispatcher, Dispatch};

/// The default period between maintenance ticks.
pub(crate) const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// A background thread that periodically wakes the processor so that idle
/// caches still expire their entries.
pub(crate) struct Ticker {
  handle: JoinHandle<()>,
  stop_flag: Arc<AtomicBool>,
}

impl Ticker {
  pub(crate) fn spawn<K, V>(
    sender: mpsc::BoundedSender<Event<K, V>>,
    interval: Duration,
    dispatch: Option<Dispatch>,
  ) -> io::Result<Self>
  where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
  {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::Builder::new()
      .name("strata-cache-ticker".into())
      .spawn(move || {
        let tick = || {
          while !stop_clone.load(Ordering::Acquire) {
            thread::park_timeout(interval);
            if stop_clone.load(Ordering::Acquire) {
              break;
            }
            // A full buffer means the processor is busy and will sweep anyway.
            let _ = sender.try_send(Event::Tick);
          }
          debug!("cache ticker stopped");
        };
        match dispatch {
          Some(dispatch) => dispatcher::with_default(&dispatch, tick),
          None => tick(),
        }
      })?;

    Ok(Self { handle, stop_flag })
  }

  /// Signals the ticker thread to exit. It releases its event sender as it
  /// does so.
  pub(crate) fn stop(&self) {
    self.stop_flag.store(true, Ordering::Release);
    self.handle.thread().unpark();
  }
}
