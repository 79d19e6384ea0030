//! Minimal OpenAI client for the counterfeit interpretation.
//!
//! One chat.completions call with a vision message: the prompt text plus the
//! image as a base64 data URL. Calls log model, latency and response size,
//! never the image or the texts themselves.
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::{GenerationError, InterpretationGenerator};
use crate::config::{OpenAiSettings, Prompts};
use crate::util::fill_template;
use crate::validator::sniff_content_type;

#[derive(Clone)]
pub struct OpenAiGenerator {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  prompts: Prompts,
}

impl OpenAiGenerator {
  pub fn new(settings: OpenAiSettings, prompts: Prompts) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(45))
      .build()?;
    Ok(Self {
      client,
      api_key: settings.api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.vision_model,
      prompts,
    })
  }

  /// Plain-text chat completion over one text + image user message.
  #[instrument(level = "info", skip(self, system, user, image_url), fields(model = %self.model))]
  async fn chat_vision(&self, system: &str, user: &str, image_url: String) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: MessageContent::Text(system.into()) },
        ChatMessageReq {
          role: "user".into(),
          content: MessageContent::Parts(vec![
            ContentPart::Text { text: user.into() },
            ContentPart::ImageUrl { image_url: ImageUrl { url: image_url } },
          ]),
        },
      ],
      temperature: self.prompts.temperature,
      max_tokens: Some(self.prompts.max_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "realpick-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| GenerationError::Request(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationError::Api { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Request(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();
    if text.is_empty() {
      return Err(GenerationError::Empty);
    }

    Ok(text)
  }
}

#[async_trait]
impl InterpretationGenerator for OpenAiGenerator {
  #[instrument(level = "info", skip(self, image, author_text), fields(image_len = image.len(), author_len = author_text.len()))]
  async fn interpret(&self, image: &[u8], author_text: &str) -> Result<String, GenerationError> {
    let mime = sniff_content_type(image);
    let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(image));
    let user = fill_template(&self.prompts.interpretation_user_template, &[("author", author_text)]);

    let start = Instant::now();
    let result = self.chat_vision(&self.prompts.interpretation_system, &user, data_url).await;
    let elapsed = start.elapsed();
    match &result {
      Ok(text) => info!(?elapsed, out_len = text.len(), "Model response received successfully"),
      Err(e) => error!(?elapsed, error = %e, "Model call failed during interpretation"),
    }
    result
  }

  fn name(&self) -> &'static str {
    "openai"
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: MessageContent }
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  ImageUrl { image_url: ImageUrl },
}
#[derive(Serialize)]
struct ImageUrl { url: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
