//! Public HTTP request/response structs (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quiz as players see it: signed image URL and both interpretations in
/// random order. Authorship is never exposed.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizOut {
  pub id: String,
  pub image_url: String,
  pub interpretations: [String; 2],
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizListOut {
  pub quizzes: Vec<QuizOut>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
  pub selected: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerOut {
  pub correct: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObjectQuery {
  pub expires: i64,
  pub signature: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
  pub error: String,
  pub message: String,
}
