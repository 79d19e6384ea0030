//! Quiz metadata as a single JSON document in the object store.
//!
//! Every mutation is a whole-document read-modify-write. Under the default
//! `LastWriterWins` policy nothing coordinates concurrent writers: two appends
//! that read the same base collection both write, and the later write drops
//! the earlier record. `Serialized` puts a process-local mutex around each
//! read-modify-write instead. Both policies stay selectable.

use std::{fmt, str::FromStr, sync::Arc};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::domain::{Quiz, QuizCollection};
use crate::storage::{ObjectStore, StorageError};

/// Well-known key of the metadata document.
pub const METADATA_KEY: &str = "metadata/quizzes.json";

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error("quiz not found: {0}")]
  NotFound(String),
  #[error("quiz id already present: {0}")]
  DuplicateId(String),
  #[error("metadata document is unreadable: {0}")]
  Corrupt(String),
  #[error("failed to encode metadata document: {0}")]
  Encode(String),
  #[error(transparent)]
  Storage(#[from] StorageError),
}

/// How concurrent read-modify-writes on the document are coordinated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
  /// No coordination; concurrent appends may lose updates.
  #[default]
  LastWriterWins,
  /// One read-modify-write at a time within this process.
  Serialized,
}

impl fmt::Display for ConsistencyMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConsistencyMode::LastWriterWins => f.write_str("last_writer_wins"),
      ConsistencyMode::Serialized => f.write_str("serialized"),
    }
  }
}

impl FromStr for ConsistencyMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "last_writer_wins" | "lww" => Ok(ConsistencyMode::LastWriterWins),
      "serialized" | "single_writer" => Ok(ConsistencyMode::Serialized),
      other => Err(format!("unknown consistency mode {other:?}")),
    }
  }
}

pub struct MetadataStore {
  objects: Arc<dyn ObjectStore>,
  mode: ConsistencyMode,
  write_lock: Mutex<()>,
}

impl MetadataStore {
  pub fn new(objects: Arc<dyn ObjectStore>, mode: ConsistencyMode) -> Self {
    info!(target: "realpick", %mode, key = METADATA_KEY, "Metadata store ready");
    Self {
      objects,
      mode,
      write_lock: Mutex::new(()),
    }
  }

  pub fn mode(&self) -> ConsistencyMode {
    self.mode
  }

  /// Append one quiz to the end of the collection.
  #[instrument(level = "debug", skip(self, quiz), fields(id = %quiz.id, mode = %self.mode))]
  pub async fn append(&self, quiz: Quiz) -> Result<(), MetadataError> {
    let _guard = self.writer_guard().await;

    let mut collection = self.load().await?;
    if collection.find(&quiz.id).is_some() {
      warn!(target: "quiz", id = %quiz.id, "Refusing to append duplicate quiz id");
      return Err(MetadataError::DuplicateId(quiz.id));
    }
    collection.quizzes.push(quiz);
    self.store(&collection).await?;
    debug!(target: "quiz", total = collection.len(), "Quiz appended");
    Ok(())
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_by_id(&self, id: &str) -> Result<Quiz, MetadataError> {
    let collection = self.load().await?;
    collection
      .find(id)
      .cloned()
      .ok_or_else(|| MetadataError::NotFound(id.to_string()))
  }

  /// Every stored quiz, oldest first. A missing document is an empty list.
  #[instrument(level = "debug", skip(self))]
  pub async fn list(&self) -> Result<Vec<Quiz>, MetadataError> {
    Ok(self.load().await?.quizzes)
  }

  /// Replace the document with an empty collection.
  #[instrument(level = "info", skip(self), fields(mode = %self.mode))]
  pub async fn clear_all(&self) -> Result<(), MetadataError> {
    let _guard = self.writer_guard().await;
    self.store(&QuizCollection::default()).await?;
    info!(target: "quiz", "All quizzes cleared");
    Ok(())
  }

  async fn writer_guard(&self) -> Option<MutexGuard<'_, ()>> {
    match self.mode {
      ConsistencyMode::LastWriterWins => None,
      ConsistencyMode::Serialized => Some(self.write_lock.lock().await),
    }
  }

  async fn load(&self) -> Result<QuizCollection, MetadataError> {
    match self.objects.get(METADATA_KEY).await? {
      None => Ok(QuizCollection::default()),
      Some(bytes) if bytes.is_empty() => Ok(QuizCollection::default()),
      Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
        warn!(target: "quiz", error = %e, size = bytes.len(), "Metadata document failed to parse");
        MetadataError::Corrupt(e.to_string())
      }),
    }
  }

  async fn store(&self, collection: &QuizCollection) -> Result<(), MetadataError> {
    let data = serde_json::to_vec(collection).map_err(|e| MetadataError::Encode(e.to_string()))?;
    self.objects.put(METADATA_KEY, &data).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{MemoryObjectStore, UrlSigner};

  fn objects() -> Arc<MemoryObjectStore> {
    Arc::new(MemoryObjectStore::new(UrlSigner::new(b"k".to_vec(), "http://localhost")))
  }

  fn quiz(author: &str) -> Quiz {
    Quiz::new("images/x.jpg", author, "something else")
  }

  #[tokio::test]
  async fn missing_document_lists_empty() {
    let store = MetadataStore::new(objects(), ConsistencyMode::default());
    assert!(store.list().await.unwrap().is_empty());
    assert!(matches!(store.get_by_id("quiz_x").await, Err(MetadataError::NotFound(_))));
  }

  #[tokio::test]
  async fn append_preserves_insertion_order() {
    let store = MetadataStore::new(objects(), ConsistencyMode::LastWriterWins);
    let (a, b, c) = (quiz("a"), quiz("b"), quiz("c"));
    for q in [&a, &b, &c] {
      store.append(q.clone()).await.unwrap();
    }
    let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![a.id.clone(), b.id, c.id]);
    assert_eq!(store.get_by_id(&a.id).await.unwrap(), a);
  }

  #[tokio::test]
  async fn duplicate_ids_are_refused() {
    let store = MetadataStore::new(objects(), ConsistencyMode::Serialized);
    let q = quiz("a");
    store.append(q.clone()).await.unwrap();
    assert!(matches!(store.append(q).await, Err(MetadataError::DuplicateId(_))));
    assert_eq!(store.list().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn clear_all_empties_the_document() {
    let objs = objects();
    let store = MetadataStore::new(objs.clone(), ConsistencyMode::default());
    let q = quiz("a");
    store.append(q.clone()).await.unwrap();
    store.clear_all().await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
    assert!(matches!(store.get_by_id(&q.id).await, Err(MetadataError::NotFound(_))));

    let raw = objs.get(METADATA_KEY).await.unwrap().unwrap();
    assert_eq!(raw, br#"{"quizzes":[]}"#);
  }

  #[tokio::test]
  async fn corrupt_document_is_reported() {
    let objs = objects();
    objs.put(METADATA_KEY, b"{not json").await.unwrap();
    let store = MetadataStore::new(objs.clone(), ConsistencyMode::default());
    assert!(matches!(store.list().await, Err(MetadataError::Corrupt(_))));
    assert!(matches!(store.append(quiz("a")).await, Err(MetadataError::Corrupt(_))));

    // clearing is the way out
    store.clear_all().await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn empty_document_counts_as_empty_collection() {
    let objs = objects();
    objs.put(METADATA_KEY, b"").await.unwrap();
    let store = MetadataStore::new(objs, ConsistencyMode::default());
    assert!(store.list().await.unwrap().is_empty());
  }

  #[test]
  fn consistency_mode_parsing() {
    assert_eq!("serialized".parse::<ConsistencyMode>(), Ok(ConsistencyMode::Serialized));
    assert_eq!("Last_Writer_Wins".parse::<ConsistencyMode>(), Ok(ConsistencyMode::LastWriterWins));
    assert!("eventually".parse::<ConsistencyMode>().is_err());
    assert_eq!(ConsistencyMode::Serialized.to_string(), "serialized");
  }
}
