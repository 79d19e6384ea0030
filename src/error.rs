//! Error taxonomy for the quiz core.
//!
//! Each layer has its own small error enum; everything funnels into `QuizError`,
//! whose variant tells the caller whether to blame the request or the backend.

use thiserror::Error;

use crate::generator::GenerationError;
use crate::metadata::MetadataError;
use crate::storage::StorageError;
use crate::validator::ValidationError;

/// Error surfaced by `QuizService` to the transport layer.
#[derive(Debug, Error)]
pub enum QuizError {
  /// Caller-fixable: empty fields, bad extension, oversize or spoofed file.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("quiz not found: {0}")]
  NotFound(String),

  /// Blob or metadata I/O failure. Transient.
  #[error("storage error: {0}")]
  Storage(String),

  /// The interpretation generator failed. Transient.
  #[error("generation error: {0}")]
  Generation(String),

  /// The metadata document cannot be parsed. Fatal until cleared or repaired.
  #[error("corrupt metadata: {0}")]
  CorruptMetadata(String),

  /// An external call ran past the operation deadline and was abandoned.
  #[error("operation cancelled: {0}")]
  Cancelled(String),
}

impl QuizError {
  /// Stable machine-readable kind, used in HTTP error bodies and log fields.
  pub fn kind(&self) -> &'static str {
    match self {
      QuizError::InvalidInput(_) => "invalid_input",
      QuizError::NotFound(_) => "not_found",
      QuizError::Storage(_) => "storage_error",
      QuizError::Generation(_) => "generation_error",
      QuizError::CorruptMetadata(_) => "corrupt_metadata",
      QuizError::Cancelled(_) => "cancelled",
    }
  }

  /// Whether a higher layer may reasonably retry the same call.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      QuizError::Storage(_) | QuizError::Generation(_) | QuizError::Cancelled(_)
    )
  }

  /// True for errors the caller caused.
  pub fn is_client_error(&self) -> bool {
    matches!(self, QuizError::InvalidInput(_) | QuizError::NotFound(_))
  }
}

impl From<ValidationError> for QuizError {
  fn from(e: ValidationError) -> Self {
    QuizError::InvalidInput(e.to_string())
  }
}

impl From<StorageError> for QuizError {
  fn from(e: StorageError) -> Self {
    match e {
      StorageError::NotFound(key) => QuizError::NotFound(key),
      StorageError::InvalidKey(key) => QuizError::InvalidInput(format!("invalid object key: {key}")),
      other => QuizError::Storage(other.to_string()),
    }
  }
}

impl From<MetadataError> for QuizError {
  fn from(e: MetadataError) -> Self {
    match e {
      MetadataError::NotFound(id) => QuizError::NotFound(id),
      MetadataError::DuplicateId(id) => QuizError::InvalidInput(format!("duplicate quiz id: {id}")),
      MetadataError::Corrupt(msg) => QuizError::CorruptMetadata(msg),
      MetadataError::Storage(inner) => QuizError::Storage(inner.to_string()),
      MetadataError::Encode(msg) => QuizError::Storage(msg),
    }
  }
}

impl From<GenerationError> for QuizError {
  fn from(e: GenerationError) -> Self {
    QuizError::Generation(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classification_matches_taxonomy() {
    assert!(QuizError::InvalidInput("x".into()).is_client_error());
    assert!(QuizError::NotFound("x".into()).is_client_error());
    assert!(!QuizError::Storage("x".into()).is_client_error());

    assert!(QuizError::Storage("x".into()).is_retryable());
    assert!(QuizError::Generation("x".into()).is_retryable());
    assert!(!QuizError::CorruptMetadata("x".into()).is_retryable());
    assert!(!QuizError::InvalidInput("x".into()).is_retryable());
  }

  #[test]
  fn metadata_not_found_stays_not_found() {
    let e: QuizError = MetadataError::NotFound("quiz_1".into()).into();
    assert_eq!(e.kind(), "not_found");
    let e: QuizError = MetadataError::Corrupt("bad json".into()).into();
    assert_eq!(e.kind(), "corrupt_metadata");
  }

  #[test]
  fn validation_errors_are_invalid_input() {
    let e: QuizError = ValidationError::UnsupportedFormat(".gif".into()).into();
    assert_eq!(e.kind(), "invalid_input");
  }
}
