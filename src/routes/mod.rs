//! Router assembly: HTTP endpoints, CORS, HTTP tracing, and the mapping from
//! `QuizError` to status codes.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, warn, Level};

use crate::error::QuizError;
use crate::protocol::ErrorOut;
use crate::state::AppState;

pub mod http;

/// Multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - signed object reads under `/api/v1/objects/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route(
            "/api/v1/quizzes",
            get(http::http_list_quizzes)
                .post(http::http_create_quiz)
                .delete(http::http_delete_quizzes),
        )
        .route("/api/v1/quizzes/:id", get(http::http_get_quiz))
        .route("/api/v1/quizzes/:id/answer", post(http::http_post_answer))
        .route("/api/v1/objects/*key", get(http::http_get_object))
        // State + body limit + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

impl QuizError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuizError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            QuizError::NotFound(_) => StatusCode::NOT_FOUND,
            QuizError::Generation(_) => StatusCode::BAD_GATEWAY,
            QuizError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
            QuizError::Storage(_) | QuizError::CorruptMetadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            warn!(target: "quiz", kind = self.kind(), error = %self, "Request rejected");
        } else {
            error!(target: "quiz", kind = self.kind(), retryable = self.is_retryable(), error = %self, "Request failed");
        }
        let body = ErrorOut { error: self.kind().to_string(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
