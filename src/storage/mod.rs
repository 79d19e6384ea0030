//! Blob storage capability and the image adapter built on top of it.
//!
//! `ObjectStore` is the raw "put / get / sign" capability. Both the image
//! adapter (`ImageStore`) and the metadata document store sit on it, so
//! swapping the backend swaps both.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::validator::{extension_for, sniff_content_type};

mod local;
mod memory;
mod signing;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use signing::{SignatureError, UrlSigner, OBJECTS_ROUTE};

/// Prefix under which uploaded images are stored.
pub const IMAGE_PREFIX: &str = "images";

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("object not found: {0}")]
  NotFound(String),
  #[error("invalid object key: {0}")]
  InvalidKey(String),
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
}

impl StorageError {
  pub fn not_found(key: impl Into<String>) -> Self {
    StorageError::NotFound(key.into())
  }
}

/// Raw object storage: whole-object writes and reads keyed by a relative path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Create or overwrite `key` with `data` in one shot.
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

  /// Read an object back. `Ok(None)` when it does not exist.
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

  /// Time-limited read-only URL for `key`.
  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Reject keys that could escape the store root or are otherwise malformed.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
  let bad = key.is_empty()
    || key.starts_with('/')
    || key.contains('\\')
    || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
  if bad {
    return Err(StorageError::InvalidKey(key.to_string()));
  }
  Ok(())
}

/// Image-facing adapter: "save these bytes somewhere new, read them back,
/// hand out a signed URL".
#[derive(Clone)]
pub struct ImageStore {
  objects: Arc<dyn ObjectStore>,
}

impl ImageStore {
  pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
    Self { objects }
  }

  /// Store a new image under a fresh unique key and return that key.
  #[instrument(level = "debug", skip(self, data), fields(size = data.len()))]
  pub async fn save(&self, data: &[u8]) -> Result<String, StorageError> {
    let ext = extension_for(sniff_content_type(data));
    let key = format!("{}/{}.{}", IMAGE_PREFIX, Uuid::new_v4().simple(), ext);
    self.objects.put(&key, data).await?;
    debug!(target: "realpick", %key, "Image stored");
    Ok(key)
  }

  pub async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
    self
      .objects
      .get(path)
      .await?
      .ok_or_else(|| StorageError::not_found(path))
  }

  pub fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
    self.objects.signed_url(path, ttl)
  }
}
