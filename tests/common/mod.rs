#![allow(dead_code)]

use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Barrier;

use realpick::generator::{GenerationError, InterpretationGenerator};
use realpick::metadata::{ConsistencyMode, MetadataStore, METADATA_KEY};
use realpick::service::{QuizService, ServiceSettings};
use realpick::storage::{ImageStore, MemoryObjectStore, ObjectStore, StorageError, UrlSigner};
use realpick::validator::ImageValidator;

pub const BASE_URL: &str = "http://localhost";

pub fn signer() -> UrlSigner {
  UrlSigner::new(b"test-secret".to_vec(), BASE_URL)
}

pub fn memory_store() -> Arc<MemoryObjectStore> {
  Arc::new(MemoryObjectStore::new(signer()))
}

/// JPEG magic followed by filler, `len` bytes total.
pub fn jpeg_bytes(len: usize) -> Vec<u8> {
  let mut v = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
  v.resize(len, 0xAB);
  v
}

// =============================================================================
// Generators
// =============================================================================

/// Returns a fixed answer (or error) and counts calls.
pub struct StubGenerator {
  reply: Result<String, String>,
  delay: Duration,
  pub calls: AtomicUsize,
  pub seen_author: Mutex<Vec<String>>,
}

impl StubGenerator {
  pub fn replying(text: &str) -> Self {
    Self { reply: Ok(text.into()), delay: Duration::ZERO, calls: AtomicUsize::new(0), seen_author: Mutex::new(vec![]) }
  }

  pub fn failing(msg: &str) -> Self {
    Self { reply: Err(msg.into()), delay: Duration::ZERO, calls: AtomicUsize::new(0), seen_author: Mutex::new(vec![]) }
  }

  pub fn slow(text: &str, delay: Duration) -> Self {
    Self { delay, ..Self::replying(text) }
  }
}

#[async_trait]
impl InterpretationGenerator for StubGenerator {
  async fn interpret(&self, _image: &[u8], author_text: &str) -> Result<String, GenerationError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.seen_author.lock().unwrap().push(author_text.to_string());
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.reply.clone().map_err(GenerationError::Request)
  }

  fn name(&self) -> &'static str {
    "stub"
  }
}

// =============================================================================
// Object stores
// =============================================================================

/// Holds the first `gated` reads of the metadata document at a barrier, so
/// that concurrent appends are guaranteed to read the same base collection.
pub struct GatedStore {
  inner: Arc<MemoryObjectStore>,
  barrier: Barrier,
  gated: usize,
  reads: AtomicUsize,
}

impl GatedStore {
  pub fn new(inner: Arc<MemoryObjectStore>, gated: usize) -> Self {
    Self { inner, barrier: Barrier::new(gated), gated, reads: AtomicUsize::new(0) }
  }
}

#[async_trait]
impl ObjectStore for GatedStore {
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    self.inner.put(key, data).await
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let data = self.inner.get(key).await?;
    if key == METADATA_KEY && self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
      self.barrier.wait().await;
    }
    Ok(data)
  }

  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
    self.inner.signed_url(key, ttl)
  }
}

/// Adds latency to every metadata read, widening the read-modify-write window.
pub struct SlowReadStore {
  inner: Arc<MemoryObjectStore>,
  delay: Duration,
}

impl SlowReadStore {
  pub fn new(inner: Arc<MemoryObjectStore>, delay: Duration) -> Self {
    Self { inner, delay }
  }
}

#[async_trait]
impl ObjectStore for SlowReadStore {
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    self.inner.put(key, data).await
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let data = self.inner.get(key).await?;
    if key == METADATA_KEY {
      tokio::time::sleep(self.delay).await;
    }
    Ok(data)
  }

  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
    self.inner.signed_url(key, ttl)
  }
}

/// Fails every write whose key starts with `prefix`.
pub struct FailingWrites {
  inner: Arc<MemoryObjectStore>,
  prefix: &'static str,
}

impl FailingWrites {
  pub fn new(inner: Arc<MemoryObjectStore>, prefix: &'static str) -> Self {
    Self { inner, prefix }
  }
}

#[async_trait]
impl ObjectStore for FailingWrites {
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    if key.starts_with(self.prefix) {
      return Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
    }
    self.inner.put(key, data).await
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    self.inner.get(key).await
  }

  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
    self.inner.signed_url(key, ttl)
  }
}

// =============================================================================
// Service wiring
// =============================================================================

pub fn service_with(
  objects: Arc<dyn ObjectStore>,
  generator: Arc<dyn InterpretationGenerator>,
  mode: ConsistencyMode,
) -> QuizService {
  service_with_settings(objects, generator, mode, ServiceSettings::default())
}

pub fn service_with_settings(
  objects: Arc<dyn ObjectStore>,
  generator: Arc<dyn InterpretationGenerator>,
  mode: ConsistencyMode,
  settings: ServiceSettings,
) -> QuizService {
  QuizService::new(
    ImageValidator::new(1024 * 1024),
    ImageStore::new(objects.clone()),
    Arc::new(MetadataStore::new(objects, mode)),
    generator,
    settings,
  )
}

/// Service over a fresh in-memory store with a generator that always says `reply`.
pub fn simple_service(reply: &str) -> (QuizService, Arc<MemoryObjectStore>) {
  let objects = memory_store();
  let svc = service_with(objects.clone(), Arc::new(StubGenerator::replying(reply)), ConsistencyMode::default());
  (svc, objects)
}
