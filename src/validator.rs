//! Upload validation: extension allow-list, bounded read, magic-byte sniffing.
//!
//! The claimed filename is only trusted for the first check; the content type
//! is always sniffed from the buffered bytes so a `.jpg`-named text file is
//! rejected.

use std::path::Path;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument, warn};

/// Default upload ceiling (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("unsupported file format: {0:?}. Allowed formats: jpg, jpeg, png")]
  UnsupportedFormat(String),
  #[error("file size exceeds maximum allowed size of {max} bytes")]
  FileTooLarge { max: u64 },
  #[error("invalid file type: {0}. Only jpeg and png are allowed")]
  InvalidContentType(String),
  #[error("failed to read upload: {0}")]
  Read(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct ImageValidator {
  max_file_size: u64,
}

impl Default for ImageValidator {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_FILE_SIZE)
  }
}

impl ImageValidator {
  pub fn new(max_file_size: u64) -> Self {
    Self { max_file_size }
  }

  pub fn max_file_size(&self) -> u64 {
    self.max_file_size
  }

  /// Validate an upload and return its fully buffered bytes.
  ///
  /// Never buffers more than `max_file_size + 1` bytes: the extra byte is the
  /// probe that tells an exactly-full upload apart from an oversize one.
  #[instrument(level = "debug", skip(self, reader), fields(%filename, max = self.max_file_size))]
  pub async fn validate_and_copy<R>(&self, reader: R, filename: &str) -> Result<Vec<u8>, ValidationError>
  where
    R: AsyncRead + Unpin,
  {
    let ext = extension_of(filename);
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
      warn!(target: "quiz", %filename, "Rejected upload: unsupported extension");
      return Err(ValidationError::UnsupportedFormat(ext));
    }

    let mut buf = Vec::new();
    reader
      .take(self.max_file_size.saturating_add(1))
      .read_to_end(&mut buf)
      .await?;
    if buf.len() as u64 > self.max_file_size {
      warn!(target: "quiz", %filename, max = self.max_file_size, "Rejected upload: too large");
      return Err(ValidationError::FileTooLarge { max: self.max_file_size });
    }

    let sniffed = sniff_content_type(&buf);
    if !ALLOWED_CONTENT_TYPES.contains(&sniffed) {
      warn!(target: "quiz", %filename, %sniffed, "Rejected upload: content type mismatch");
      return Err(ValidationError::InvalidContentType(sniffed.to_string()));
    }

    debug!(target: "quiz", size = buf.len(), %sniffed, "Upload validated");
    Ok(buf)
  }
}

/// Lower-cased extension without the dot; empty when there is none.
fn extension_of(filename: &str) -> String {
  Path::new(filename)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .unwrap_or_default()
}

/// Magic-byte content sniffing for the handful of types we care to name.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
  const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"%PDF-", "application/pdf"),
  ];

  if data.is_empty() {
    return "text/plain; charset=utf-8";
  }
  for (magic, mime) in SIGNATURES {
    if data.starts_with(magic) {
      return mime;
    }
  }
  if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
    return "image/webp";
  }
  if std::str::from_utf8(data).is_ok() {
    return "text/plain; charset=utf-8";
  }
  "application/octet-stream"
}

/// File extension to store a sniffed image under.
pub fn extension_for(content_type: &str) -> &'static str {
  match content_type {
    "image/jpeg" => "jpg",
    "image/png" => "png",
    _ => "bin",
  }
}
