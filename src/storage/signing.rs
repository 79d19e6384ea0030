//! HMAC-SHA256 signed read URLs for stored objects.
//!
//! URL shape: `{base}/api/v1/objects/{key}?expires={unix}&signature={hex}`.
//! The signature covers `key` and `expires`, so neither can be edited.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Route prefix the transport serves signed objects from.
pub const OBJECTS_ROUTE: &str = "/api/v1/objects";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("signed URL expired")]
  Expired,
  #[error("signature does not match")]
  Mismatch,
}

#[derive(Clone)]
pub struct UrlSigner {
  secret: Vec<u8>,
  base_url: String,
}

impl std::fmt::Debug for UrlSigner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UrlSigner").field("base_url", &self.base_url).finish_non_exhaustive()
  }
}

impl UrlSigner {
  pub fn new(secret: Vec<u8>, base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { secret, base_url }
  }

  pub fn sign(&self, key: &str, ttl: Duration) -> String {
    let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
    self.sign_until(key, expires)
  }

  /// Sign with an absolute expiry (unix seconds).
  pub fn sign_until(&self, key: &str, expires: i64) -> String {
    let signature = hex::encode(self.mac(key, expires).finalize().into_bytes());
    format!(
      "{}{}/{}?expires={}&signature={}",
      self.base_url, OBJECTS_ROUTE, key, expires, signature
    )
  }

  pub fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<(), SignatureError> {
    if Utc::now().timestamp() > expires {
      return Err(SignatureError::Expired);
    }
    let raw = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;
    self
      .mac(key, expires)
      .verify_slice(&raw)
      .map_err(|_| SignatureError::Mismatch)
  }

  fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
      .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(key.as_bytes());
    mac.update(b"\n");
    mac.update(expires.to_string().as_bytes());
    mac
  }
}
