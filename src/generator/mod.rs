//! Counterfeit-interpretation generators.
//!
//! One capability, `InterpretationGenerator`, with backends picked once at
//! startup from configuration. The quiz service only ever sees the trait.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{AppConfig, ConfigError, GeneratorKind};

mod command;
mod fixture;
mod openai;

pub use command::CommandGenerator;
pub use fixture::{default_fixtures, FixtureGenerator};
pub use openai::OpenAiGenerator;

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("model request failed: {0}")]
  Request(String),
  #[error("model returned HTTP {status}: {message}")]
  Api { status: u16, message: String },
  #[error("generator command failed: {0}")]
  Command(String),
  #[error("generator returned an empty interpretation")]
  Empty,
  #[error("generator repeated the author's interpretation")]
  NotDistinct,
  #[error("no fixture interpretation available")]
  NoFixture,
}

/// Given an image and its author's reading of it, produce a different,
/// plausible reading. No determinism is promised.
#[async_trait]
pub trait InterpretationGenerator: Send + Sync {
  async fn interpret(&self, image: &[u8], author_text: &str) -> Result<String, GenerationError>;

  /// Short backend name for logs.
  fn name(&self) -> &'static str;
}

/// Build the generator selected in configuration.
pub fn build_generator(cfg: &AppConfig) -> Result<Arc<dyn InterpretationGenerator>, ConfigError> {
  let generator: Arc<dyn InterpretationGenerator> = match cfg.generator {
    GeneratorKind::OpenAi => {
      let settings = cfg.openai.clone().ok_or_else(|| ConfigError::Invalid {
        var: "OPENAI_API_KEY",
        message: "required when GENERATOR=openai".into(),
      })?;
      let oa = OpenAiGenerator::new(settings, cfg.prompts.clone())
        .map_err(|e| ConfigError::Invalid { var: "OPENAI_BASE_URL", message: e.to_string() })?;
      info!(target: "realpick", base_url = %oa.base_url, model = %oa.model, "OpenAI generator enabled.");
      Arc::new(oa)
    }
    GeneratorKind::Command => {
      let cmd = CommandGenerator::from_argv(&cfg.generator_command).ok_or_else(|| ConfigError::Invalid {
        var: "GENERATOR_COMMAND",
        message: "required when GENERATOR=command".into(),
      })?;
      info!(target: "realpick", program = %cmd.program, "Command generator enabled.");
      Arc::new(cmd)
    }
    GeneratorKind::Fixture => {
      let fixtures = if cfg.fixtures.is_empty() { default_fixtures() } else { cfg.fixtures.clone() };
      info!(target: "realpick", count = fixtures.len(), "Fixture generator enabled (canned interpretations).");
      Arc::new(FixtureGenerator::new(fixtures))
    }
  };
  Ok(generator)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::OpenAiSettings;

  #[test]
  fn picks_the_configured_backend() {
    let cfg = AppConfig::default();
    assert_eq!(build_generator(&cfg).unwrap().name(), "fixture");

    let cfg = AppConfig {
      generator: GeneratorKind::Command,
      generator_command: vec!["./caption.sh".into()],
      ..AppConfig::default()
    };
    assert_eq!(build_generator(&cfg).unwrap().name(), "command");

    let cfg = AppConfig {
      generator: GeneratorKind::OpenAi,
      openai: Some(OpenAiSettings {
        api_key: "sk-test".into(),
        base_url: "http://127.0.0.1:9".into(),
        vision_model: "gpt-4o-mini".into(),
      }),
      ..AppConfig::default()
    };
    assert_eq!(build_generator(&cfg).unwrap().name(), "openai");
  }

  #[test]
  fn missing_backend_settings_are_config_errors() {
    let cfg = AppConfig { generator: GeneratorKind::OpenAi, ..AppConfig::default() };
    assert!(matches!(build_generator(&cfg), Err(ConfigError::Invalid { var: "OPENAI_API_KEY", .. })));

    let cfg = AppConfig { generator: GeneratorKind::Command, ..AppConfig::default() };
    assert!(matches!(build_generator(&cfg), Err(ConfigError::Invalid { var: "GENERATOR_COMMAND", .. })));
  }
}
