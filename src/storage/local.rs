use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{check_key, ObjectStore, StorageError, UrlSigner};

/// Objects as plain files under a base directory.
///
/// Writes go to a temp file that is renamed into place, so a reader sees either
/// the old or the new object, never a torn one.
pub struct LocalObjectStore {
  base_path: PathBuf,
  signer: UrlSigner,
}

impl LocalObjectStore {
  pub fn new(base_path: impl AsRef<Path>, signer: UrlSigner) -> Self {
    Self {
      base_path: base_path.as_ref().to_path_buf(),
      signer,
    }
  }

  /// Create the base directory.
  pub async fn init(&self) -> Result<(), StorageError> {
    fs::create_dir_all(&self.base_path).await?;
    Ok(())
  }

  fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
    check_key(key)?;
    Ok(self.base_path.join(key))
  }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
  #[instrument(level = "debug", skip(self, data), fields(%key, size = data.len()))]
  async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
    let path = self.object_path(key)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    let written = async {
      let mut file = fs::File::create(&tmp).await?;
      file.write_all(data).await?;
      file.flush().await?;
      drop(file);
      fs::rename(&tmp, &path).await?;
      Ok::<_, std::io::Error>(())
    }
    .await;
    if let Err(e) = written {
      if let Err(cleanup) = fs::remove_file(&tmp).await {
        debug!(target: "realpick", tmp = %tmp.display(), error = %cleanup, "Temp object not removed");
      }
      return Err(e.into());
    }
    debug!(target: "realpick", %key, "Object written");
    Ok(())
  }

  #[instrument(level = "debug", skip(self), fields(%key))]
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
    let path = self.object_path(key)?;
    match fs::read(&path).await {
      Ok(data) => Ok(Some(data)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
    check_key(key)?;
    Ok(self.signer.sign(key, ttl))
  }
}
