//! An in-process, concurrent key/value cache with bounded capacity,
//! time-based expiration, pluggable eviction and stampede-free loading.
//!
//! # Design
//! - **Sharded index**: keys live in independently locked segments, so reads
//!   and writes of different keys rarely contend.
//! - **Event-sourced bookkeeping**: handles never touch the eviction queues.
//!   They publish events to a single background processor that owns the
//!   queues, so a read never waits on list maintenance.
//! - **Loading**: `LoadingCache::get` runs the loader at most once per missing
//!   key; concurrent callers wait for and share its result.
//! - **Policies**: `lru` (default), `slru` and `tinylfu` are built in; custom
//!   policies can be registered by name.
//!
//! ```
//! use strata_cache::CacheBuilder;
//!
//! let cache = CacheBuilder::<String, u32>::new()
//!   .maximum_size(1_000)
//!   .build()
//!   .unwrap();
//! cache.put("answer".to_string(), 42);
//! assert_eq!(cache.get_if_present("answer").as_deref(), Some(&42));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod policy;
pub mod stats;

// Internal, crate-only modules
mod entry;
mod segment;
mod shared;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::{CacheBuilder, MAXIMUM_CAPACITY};
pub use entry::CacheEntry;
pub use error::{BoxError, BuildError, CacheError};
pub use handles::{Cache, LoadingCache};
pub use listener::{InsertionListener, RemovalCause, RemovalListener};
pub use policy::{BackingIndex, EvictionPolicy, PolicyContext, PolicyRegistry};
pub use stats::{AtomicStatsCounter, CacheStats, NullStatsCounter, StatsCounter};
