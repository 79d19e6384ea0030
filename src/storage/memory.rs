use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_key, ObjectStore, StorageError, UrlSigner};

/// In-process object store. Nothing survives a restart.
pub struct MemoryObjectStore {
  objects: RwLock<HashMap<String, Vec<u8>>>,
  signer: UrlSigner,
}

impl MemoryObjectStore {
  pub fn new(signer: UrlSigner) -> Self {
    Self {
      objects: RwLock::new(HashMap::new()),
      signer,
    }
  }

  pub async fn len(&self) -> usize {
    self.objects.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    check_key(key)?;
    self.objects.write().await.insert(key.to_string(), data.to_vec());
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    check_key(key)?;
    Ok(self.objects.read().await.get(key).cloned())
  }

  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
    check_key(key)?;
    Ok(self.signer.sign(key, ttl))
  }
}
