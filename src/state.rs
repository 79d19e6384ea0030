//! Application state: the quiz service wired to its backends, plus the URL
//! signer the object route verifies against.
//!
//! Backends (object store, generator, consistency policy) are chosen here,
//! once, from `AppConfig`. Nothing downstream branches on which one it got.

use std::sync::Arc;

use rand::RngCore;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, StorageBackend};
use crate::generator::build_generator;
use crate::metadata::MetadataStore;
use crate::service::{QuizService, ServiceSettings};
use crate::storage::{ImageStore, LocalObjectStore, MemoryObjectStore, ObjectStore, UrlSigner};
use crate::validator::ImageValidator;

#[derive(Clone)]
pub struct AppState {
  pub service: QuizService,
  pub signer: UrlSigner,
  pub max_upload_bytes: u64,
}

impl AppState {
  pub fn new(service: QuizService, signer: UrlSigner) -> Self {
    let max_upload_bytes = service.validator().max_file_size();
    Self { service, signer, max_upload_bytes }
  }

  /// Build state from configuration: object store, metadata, generator, service.
  #[instrument(level = "info", skip_all, fields(storage = ?cfg.storage, generator = ?cfg.generator, consistency = %cfg.consistency))]
  pub async fn from_config(cfg: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
    let secret = match &cfg.signing_secret {
      Some(s) => s.as_bytes().to_vec(),
      None => {
        warn!(target: "realpick", "URL_SIGNING_SECRET not set; signed URLs will not survive a restart.");
        let mut buf = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
      }
    };
    let signer = UrlSigner::new(secret, cfg.public_base_url.clone());

    let objects: Arc<dyn ObjectStore> = match cfg.storage {
      StorageBackend::Local => {
        let local = LocalObjectStore::new(&cfg.data_dir, signer.clone());
        local.init().await?;
        info!(target: "realpick", data_dir = %cfg.data_dir.display(), "Local object store ready");
        Arc::new(local)
      }
      StorageBackend::Memory => {
        warn!(target: "realpick", "In-memory object store: quizzes are lost on restart.");
        Arc::new(MemoryObjectStore::new(signer.clone()))
      }
    };

    let metadata = Arc::new(MetadataStore::new(objects.clone(), cfg.consistency));
    let generator = build_generator(cfg)?;
    let service = QuizService::new(
      ImageValidator::new(cfg.max_upload_bytes),
      ImageStore::new(objects),
      metadata,
      generator,
      ServiceSettings {
        signed_url_ttl: cfg.signed_url_ttl,
        operation_timeout: cfg.operation_timeout,
      },
    );

    Ok(Self::new(service, signer))
  }
}
