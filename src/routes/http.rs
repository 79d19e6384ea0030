//! HTTP endpoint handlers. These are thin wrappers that forward to `QuizService`.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Multipart, Path, Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::Quiz;
use crate::error::QuizError;
use crate::protocol::*;
use crate::service::QuizService;
use crate::state::AppState;
use crate::validator::{sniff_content_type, ValidationError};

/// Sign the image and shuffle the interpretations for presentation.
pub fn present(service: &QuizService, quiz: &Quiz) -> Result<QuizOut, QuizError> {
  Ok(QuizOut {
    id: quiz.id.clone(),
    image_url: service.get_signed_image_url(&quiz.image_path)?,
    interpretations: service.get_randomized_interpretations(quiz),
    created_at: quiz.created_at,
  })
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

/// Multipart upload: `file` (the image) and `interpretation` (the author's text).
#[instrument(level = "info", skip(state, multipart))]
pub async fn http_create_quiz(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<QuizOut>, QuizError> {
  let max = state.max_upload_bytes;
  let mut file: Option<(String, Vec<u8>)> = None;
  let mut interpretation: Option<String> = None;

  while let Some(field) = multipart.next_field().await.map_err(|e| bad_multipart(e, max))? {
    let name = field.name().map(str::to_string);
    match name.as_deref() {
      Some("file") => {
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| bad_multipart(e, max))?;
        file = Some((filename, bytes.to_vec()));
      }
      Some("interpretation") => {
        interpretation = Some(field.text().await.map_err(|e| bad_multipart(e, max))?);
      }
      other => warn!(target: "quiz", field = ?other, "Ignoring unknown multipart field"),
    }
  }

  let (filename, bytes) = file.ok_or_else(|| QuizError::InvalidInput("multipart field `file` is required".into()))?;
  let interpretation = interpretation.unwrap_or_default();

  let quiz = state
    .service
    .create_quiz_from_upload(&bytes[..], &filename, &interpretation)
    .await?;
  info!(target: "quiz", id = %quiz.id, "HTTP quiz created");
  Ok(Json(present(&state.service, &quiz)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_quizzes(State(state): State<Arc<AppState>>) -> Result<Json<QuizListOut>, QuizError> {
  let quizzes = state
    .service
    .get_quiz_list()
    .await?
    .iter()
    .map(|q| present(&state.service, q))
    .collect::<Result<Vec<_>, _>>()?;
  info!(target: "quiz", count = quizzes.len(), "HTTP quiz list served");
  Ok(Json(QuizListOut { quizzes }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<QuizOut>, QuizError> {
  let quiz = state.service.get_quiz(&id).await?;
  Ok(Json(present(&state.service, &quiz)?))
}

#[instrument(level = "info", skip(state, body), fields(%id, selected_len = body.selected.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, QuizError> {
  let quiz = state.service.get_quiz(&id).await?;
  let correct = state.service.verify_answer(&quiz, &body.selected);
  info!(target: "quiz", %id, %correct, "HTTP answer evaluated");
  Ok(Json(AnswerOut { correct }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_quizzes(State(state): State<Arc<AppState>>) -> Result<StatusCode, QuizError> {
  state.service.delete_all_quizzes().await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Serve a stored object behind a valid, unexpired signature.
#[instrument(level = "info", skip(state, q), fields(%key))]
pub async fn http_get_object(
  State(state): State<Arc<AppState>>,
  Path(key): Path<String>,
  Query(q): Query<ObjectQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorOut>)> {
  if let Err(e) = state.signer.verify(&key, q.expires, &q.signature) {
    warn!(target: "realpick", %key, error = %e, "Rejected object read");
    let body = ErrorOut { error: "forbidden".into(), message: e.to_string() };
    return Err((StatusCode::FORBIDDEN, Json(body)));
  }

  match state.service.read_image(&key).await {
    Ok(bytes) => {
      let mime = sniff_content_type(&bytes);
      Ok(([(header::CONTENT_TYPE, mime)], bytes))
    }
    Err(e) => {
      let body = ErrorOut { error: e.kind().into(), message: e.to_string() };
      Err((e.status_code(), Json(body)))
    }
  }
}

/// The body limit trips inside multipart parsing; report it as the oversize
/// upload it is rather than as a malformed body.
fn bad_multipart(e: axum::extract::multipart::MultipartError, max: u64) -> QuizError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    warn!(target: "quiz", max, "Rejected upload: body limit exceeded");
    return ValidationError::FileTooLarge { max }.into();
  }
  QuizError::InvalidInput(format!("malformed multipart body: {e}"))
}
