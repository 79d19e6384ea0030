//! Quiz lifecycle: creation, lookup, randomized presentation, answer checking.
//!
//! Creation runs strictly in order: validate, store image, generate the
//! counterfeit interpretation, persist the record. An image stored before a
//! later step fails stays in the store as an orphan.
//!
//! Every external call runs under `operation_timeout`; when it expires the
//! call is dropped and the operation fails with `QuizError::Cancelled`.
//! Nothing here retries.

use std::{future::Future, sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::io::AsyncRead;
use tracing::{info, instrument, warn};

use crate::domain::Quiz;
use crate::error::QuizError;
use crate::generator::{GenerationError, InterpretationGenerator};
use crate::metadata::MetadataStore;
use crate::storage::ImageStore;
use crate::util::preview;
use crate::validator::ImageValidator;

#[derive(Clone, Copy, Debug)]
pub struct ServiceSettings {
  pub signed_url_ttl: Duration,
  pub operation_timeout: Duration,
}

impl Default for ServiceSettings {
  fn default() -> Self {
    Self {
      signed_url_ttl: Duration::from_secs(15 * 60),
      operation_timeout: Duration::from_secs(60),
    }
  }
}

#[derive(Clone)]
pub struct QuizService {
  validator: ImageValidator,
  images: ImageStore,
  metadata: Arc<MetadataStore>,
  generator: Arc<dyn InterpretationGenerator>,
  settings: ServiceSettings,
}

impl QuizService {
  pub fn new(
    validator: ImageValidator,
    images: ImageStore,
    metadata: Arc<MetadataStore>,
    generator: Arc<dyn InterpretationGenerator>,
    settings: ServiceSettings,
  ) -> Self {
    Self { validator, images, metadata, generator, settings }
  }

  pub fn validator(&self) -> &ImageValidator {
    &self.validator
  }

  /// Validate a raw upload, then create the quiz from the validated bytes.
  #[instrument(level = "info", skip(self, reader, author_interpretation), fields(%filename, author_len = author_interpretation.len()))]
  pub async fn create_quiz_from_upload<R>(
    &self,
    reader: R,
    filename: &str,
    author_interpretation: &str,
  ) -> Result<Quiz, QuizError>
  where
    R: AsyncRead + Unpin,
  {
    if author_interpretation.is_empty() {
      return Err(QuizError::InvalidInput("author interpretation is required".into()));
    }
    let bytes = self.validator.validate_and_copy(reader, filename).await?;
    self.create_quiz(bytes, author_interpretation).await
  }

  /// Store the image, generate the counterfeit, persist and return the quiz.
  #[instrument(level = "info", skip(self, image, author_interpretation), fields(image_len = image.len(), author_len = author_interpretation.len()))]
  pub async fn create_quiz(&self, image: Vec<u8>, author_interpretation: &str) -> Result<Quiz, QuizError> {
    if image.is_empty() {
      return Err(QuizError::InvalidInput("image data is required".into()));
    }
    if author_interpretation.is_empty() {
      return Err(QuizError::InvalidInput("author interpretation is required".into()));
    }

    let image_path = self
      .within("save image", async {
        self.images.save(&image).await.map_err(|e| QuizError::Storage(e.to_string()))
      })
      .await?;

    let generated = self
      .within("generate interpretation", self.generator.interpret(&image, author_interpretation))
      .await
      .inspect_err(|e| warn!(target: "quiz", generator = self.generator.name(), %image_path, error = %e, "Generation failed; image left orphaned"))?;
    let ai_interpretation = check_generated(&generated, author_interpretation)?;

    let quiz = Quiz::new(image_path, author_interpretation, ai_interpretation);
    self
      .within("append quiz", self.metadata.append(quiz.clone()))
      .await
      .inspect_err(|e| warn!(target: "quiz", id = %quiz.id, image_path = %quiz.image_path, error = %e, "Persisting quiz failed; image left orphaned"))?;

    info!(
      target: "quiz",
      id = %quiz.id,
      generator = self.generator.name(),
      ai_preview = %preview(&quiz.ai_interpretation, 40),
      "Quiz created"
    );
    Ok(quiz)
  }

  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn get_quiz(&self, id: &str) -> Result<Quiz, QuizError> {
    if id.is_empty() {
      return Err(QuizError::InvalidInput("quiz id is required".into()));
    }
    self.within("get quiz", self.metadata.get_by_id(id)).await
  }

  /// All quizzes, oldest first, exactly as stored.
  #[instrument(level = "info", skip(self))]
  pub async fn get_quiz_list(&self) -> Result<Vec<Quiz>, QuizError> {
    self.within("list quizzes", self.metadata.list()).await
  }

  /// Both interpretations in an order drawn fresh for this call.
  pub fn get_randomized_interpretations(&self, quiz: &Quiz) -> [String; 2] {
    randomized_pair(quiz, &mut StdRng::from_entropy())
  }

  /// Exact byte comparison against the author's interpretation.
  pub fn verify_answer(&self, quiz: &Quiz, selected_interpretation: &str) -> bool {
    selected_interpretation == quiz.author_interpretation
  }

  pub fn get_signed_image_url(&self, image_path: &str) -> Result<String, QuizError> {
    if image_path.is_empty() {
      return Err(QuizError::InvalidInput("image path is required".into()));
    }
    Ok(self.images.signed_url(image_path, self.settings.signed_url_ttl)?)
  }

  /// Raw bytes of a stored image.
  pub async fn read_image(&self, image_path: &str) -> Result<Vec<u8>, QuizError> {
    self.within("read image", self.images.read(image_path)).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn delete_all_quizzes(&self) -> Result<(), QuizError> {
    self.within("clear quizzes", self.metadata.clear_all()).await
  }

  /// Run one external call under the operation deadline.
  async fn within<T, E, F>(&self, step: &'static str, fut: F) -> Result<T, QuizError>
  where
    F: Future<Output = Result<T, E>>,
    QuizError: From<E>,
  {
    let limit = self.settings.operation_timeout;
    match tokio::time::timeout(limit, fut).await {
      Ok(result) => result.map_err(QuizError::from),
      Err(_) => {
        warn!(target: "quiz", %step, ?limit, "External call exceeded deadline; abandoned");
        Err(QuizError::Cancelled(format!("{step} exceeded {limit:?}")))
      }
    }
  }
}

/// Trimmed generated text, provided it is usable as a counterfeit.
fn check_generated(generated: &str, author_interpretation: &str) -> Result<String, QuizError> {
  let text = generated.trim();
  if text.is_empty() {
    return Err(GenerationError::Empty.into());
  }
  if text == author_interpretation {
    return Err(GenerationError::NotDistinct.into());
  }
  Ok(text.to_string())
}

fn randomized_pair<R: Rng + ?Sized>(quiz: &Quiz, rng: &mut R) -> [String; 2] {
  let author = quiz.author_interpretation.clone();
  let ai = quiz.ai_interpretation.clone();
  if rng.gen_bool(0.5) {
    [author, ai]
  } else {
    [ai, author]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::mock::StepRng;

  fn quiz() -> Quiz {
    Quiz::new("images/a.jpg", "投稿者の解釈", "AIの解釈")
  }

  #[test]
  fn generated_text_must_be_distinct_and_non_empty() {
    assert_eq!(check_generated("  dusk  ", "sunset").unwrap(), "dusk");
    assert!(matches!(check_generated("   ", "sunset"), Err(QuizError::Generation(_))));
    assert!(matches!(check_generated(" sunset\n", "sunset"), Err(QuizError::Generation(_))));
  }

  #[test]
  fn pair_always_holds_both_texts() {
    let q = quiz();
    // StepRng(0, 0) always yields 0, so gen_bool(0.5) is always true.
    let pair = randomized_pair(&q, &mut StepRng::new(0, 0));
    assert_eq!(pair, [q.author_interpretation.clone(), q.ai_interpretation.clone()]);
    let pair = randomized_pair(&q, &mut StepRng::new(u64::MAX, 0));
    assert_eq!(pair, [q.ai_interpretation.clone(), q.author_interpretation.clone()]);
  }
}
