//! Background threads of the cache: the event processor that owns the
//! ordering queues, and the ticker that keeps idle caches expiring.

pub(crate) mod processor;
pub(crate) mod ticker;
