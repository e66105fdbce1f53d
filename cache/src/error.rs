use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// The error type a loader function returns.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur when building a cache.
#[derive(Debug, Error)]
pub enum BuildError {
  /// No eviction policy is registered under the requested name.
  #[error("unknown eviction policy `{0}`")]
  UnknownPolicy(String),
  /// A background maintenance thread could not be started.
  #[error("failed to spawn cache maintenance thread: {0}")]
  Spawn(#[from] io::Error),
}

/// Errors returned by cache reads.
///
/// Cloning is cheap, so every caller that waited on the same load receives
/// the same underlying error.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
  /// The loader failed. Nothing was cached for the key.
  #[error("cache loader failed: {0}")]
  Loader(Arc<dyn StdError + Send + Sync>),
}

impl CacheError {
  pub(crate) fn from_loader(error: BoxError) -> Self {
    CacheError::Loader(Arc::from(error))
  }

  /// Returns the loader's error.
  pub fn loader_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
    match self {
      CacheError::Loader(error) => error.as_ref(),
    }
  }
}
