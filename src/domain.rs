//! Domain models: the quiz record and the collection persisted as one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One uploaded image plus the uploader's interpretation and the generated
/// counterfeit. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
  pub id: String,
  pub image_path: String,
  pub author_interpretation: String,
  pub ai_interpretation: String,
  pub created_at: DateTime<Utc>,
}

impl Quiz {
  /// Build a quiz with a fresh id and the current time.
  pub fn new(
    image_path: impl Into<String>,
    author_interpretation: impl Into<String>,
    ai_interpretation: impl Into<String>,
  ) -> Self {
    Self {
      id: new_quiz_id(),
      image_path: image_path.into(),
      author_interpretation: author_interpretation.into(),
      ai_interpretation: ai_interpretation.into(),
      created_at: Utc::now(),
    }
  }
}

/// Opaque quiz id: `quiz_` + a random v4 UUID.
pub fn new_quiz_id() -> String {
  format!("quiz_{}", Uuid::new_v4().simple())
}

/// The metadata document: all quizzes, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizCollection {
  #[serde(default)]
  pub quizzes: Vec<Quiz>,
}

impl QuizCollection {
  pub fn find(&self, id: &str) -> Option<&Quiz> {
    self.quizzes.iter().find(|q| q.id == id)
  }

  pub fn len(&self) -> usize {
    self.quizzes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.quizzes.is_empty()
  }
}
