//! Process configuration: environment variables plus an optional TOML file for
//! prompts and fixture interpretations.
//!
//! See `AppConfig::from_lookup` for the variables read, and `FileConfig` for
//! the TOML schema.

use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::metadata::ConsistencyMode;
use crate::validator::DEFAULT_MAX_FILE_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("{var}: {message}")]
  Invalid { var: &'static str, message: String },
  #[error("failed to read config file {path}: {source}")]
  Read { path: String, source: std::io::Error },
  #[error("failed to parse config file {path}: {source}")]
  Parse { path: String, source: toml::de::Error },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
  /// Files under `DATA_DIR`.
  Local,
  /// In-process map; lost on restart.
  Memory,
}

impl FromStr for StorageBackend {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "local" | "fs" => Ok(StorageBackend::Local),
      "memory" | "mem" => Ok(StorageBackend::Memory),
      other => Err(format!("unknown storage backend {other:?}")),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
  OpenAi,
  Command,
  Fixture,
}

impl FromStr for GeneratorKind {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "openai" => Ok(GeneratorKind::OpenAi),
      "command" | "cli" => Ok(GeneratorKind::Command),
      "fixture" | "fixtures" => Ok(GeneratorKind::Fixture),
      other => Err(format!("unknown generator {other:?}")),
    }
  }
}

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
  pub api_key: String,
  pub base_url: String,
  pub vision_model: String,
}

/// Prompts used by the OpenAI generator. Override them in TOML to tune tone.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub interpretation_system: String,
  /// `{author}` is replaced with the uploader's interpretation.
  pub interpretation_user_template: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      interpretation_system: "You write one short, personal caption for a photo, as if you had taken it. Output ONLY the caption text.".into(),
      interpretation_user_template: "The photographer described this image as: \"{author}\".\nWrite a different but equally plausible personal interpretation of the same image, in the same language, tone and length. Do not repeat or paraphrase theirs.".into(),
      temperature: 0.9,
      max_tokens: 120,
    }
  }
}

/// Optional TOML file (`QUIZ_CONFIG_PATH`).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Canned interpretations for `GENERATOR=fixture`.
  #[serde(default)]
  pub fixtures: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub public_base_url: String,
  pub storage: StorageBackend,
  pub data_dir: PathBuf,
  pub max_upload_bytes: u64,
  pub signed_url_ttl: Duration,
  pub signing_secret: Option<String>,
  pub generator: GeneratorKind,
  pub generator_command: Vec<String>,
  pub openai: Option<OpenAiSettings>,
  pub consistency: ConsistencyMode,
  pub operation_timeout: Duration,
  pub prompts: Prompts,
  pub fixtures: Vec<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      port: 8080,
      public_base_url: "http://localhost:8080".into(),
      storage: StorageBackend::Local,
      data_dir: PathBuf::from("./data"),
      max_upload_bytes: DEFAULT_MAX_FILE_SIZE,
      signed_url_ttl: Duration::from_secs(15 * 60),
      signing_secret: None,
      generator: GeneratorKind::Fixture,
      generator_command: Vec::new(),
      openai: None,
      consistency: ConsistencyMode::LastWriterWins,
      operation_timeout: Duration::from_secs(60),
      prompts: Prompts::default(),
      fixtures: Vec::new(),
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Build configuration from any key lookup. Unset or blank values take defaults.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut cfg = AppConfig::default();

    if let Some(v) = get("PORT") {
      cfg.port = parse_var("PORT", &v)?;
    }
    cfg.public_base_url = get("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", cfg.port));
    if let Some(v) = get("STORAGE_BACKEND") {
      cfg.storage = parse_var("STORAGE_BACKEND", &v)?;
    }
    if let Some(v) = get("DATA_DIR") {
      cfg.data_dir = PathBuf::from(v);
    }
    if let Some(v) = get("MAX_UPLOAD_BYTES") {
      cfg.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", &v)?;
    }
    if let Some(v) = get("SIGNED_URL_TTL_SECS") {
      cfg.signed_url_ttl = Duration::from_secs(parse_var("SIGNED_URL_TTL_SECS", &v)?);
    }
    cfg.signing_secret = get("URL_SIGNING_SECRET");
    if let Some(v) = get("METADATA_CONSISTENCY") {
      cfg.consistency = parse_var("METADATA_CONSISTENCY", &v)?;
    }
    if let Some(v) = get("OPERATION_TIMEOUT_SECS") {
      cfg.operation_timeout = Duration::from_secs(parse_var("OPERATION_TIMEOUT_SECS", &v)?);
    }

    cfg.openai = get("OPENAI_API_KEY").map(|api_key| OpenAiSettings {
      api_key,
      base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into()),
      vision_model: get("OPENAI_VISION_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
    });
    cfg.generator = match get("GENERATOR") {
      Some(v) => parse_var("GENERATOR", &v)?,
      None if cfg.openai.is_some() => GeneratorKind::OpenAi,
      None => GeneratorKind::Fixture,
    };
    cfg.generator_command = get("GENERATOR_COMMAND")
      .map(|v| v.split_whitespace().map(String::from).collect())
      .unwrap_or_default();

    if let Some(path) = get("QUIZ_CONFIG_PATH") {
      let file = load_file_config(&path)?;
      cfg.prompts = file.prompts;
      cfg.fixtures = file.fixtures;
    }

    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let invalid = |var: &'static str, message: &str| Err(ConfigError::Invalid { var, message: message.into() });

    if self.max_upload_bytes == 0 {
      return invalid("MAX_UPLOAD_BYTES", "must be greater than zero");
    }
    if self.signed_url_ttl.is_zero() {
      return invalid("SIGNED_URL_TTL_SECS", "must be greater than zero");
    }
    if self.operation_timeout.is_zero() {
      return invalid("OPERATION_TIMEOUT_SECS", "must be greater than zero");
    }
    if !(self.public_base_url.starts_with("http://") || self.public_base_url.starts_with("https://")) {
      return invalid("PUBLIC_BASE_URL", "must start with http:// or https://");
    }
    match self.generator {
      GeneratorKind::OpenAi if self.openai.is_none() => invalid("OPENAI_API_KEY", "required when GENERATOR=openai"),
      GeneratorKind::Command if self.generator_command.is_empty() => {
        invalid("GENERATOR_COMMAND", "required when GENERATOR=command")
      }
      _ => Ok(()),
    }
  }

  pub fn bind_addr(&self) -> std::net::SocketAddr {
    std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
  }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw.parse::<T>().map_err(|e| ConfigError::Invalid { var, message: e.to_string() })
}

/// Load the optional TOML file at `path`.
pub fn load_file_config(path: &str) -> Result<FileConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.into(), source })?;
  let cfg = toml::from_str::<FileConfig>(&s).map_err(|source| ConfigError::Parse { path: path.into(), source })?;
  info!(target: "realpick", %path, fixtures = cfg.fixtures.len(), "Loaded quiz config (TOML)");
  Ok(cfg)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn cfg(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    AppConfig::from_lookup(|k| map.get(k).cloned())
  }

  #[test]
  fn defaults() {
    let c = cfg(&[]).unwrap();
    assert_eq!(c.port, 8080);
    assert_eq!(c.public_base_url, "http://localhost:8080");
    assert_eq!(c.storage, StorageBackend::Local);
    assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);
    assert_eq!(c.signed_url_ttl, Duration::from_secs(900));
    assert_eq!(c.generator, GeneratorKind::Fixture);
    assert_eq!(c.consistency, ConsistencyMode::LastWriterWins);
  }

  #[test]
  fn openai_key_selects_openai_generator() {
    let c = cfg(&[("OPENAI_API_KEY", "sk-test"), ("PORT", "9000")]).unwrap();
    assert_eq!(c.generator, GeneratorKind::OpenAi);
    assert_eq!(c.public_base_url, "http://localhost:9000");
    let oa = c.openai.unwrap();
    assert_eq!(oa.base_url, "https://api.openai.com/v1");
    assert_eq!(oa.vision_model, "gpt-4o-mini");
  }

  #[test]
  fn explicit_values_override() {
    let c = cfg(&[
      ("STORAGE_BACKEND", "memory"),
      ("METADATA_CONSISTENCY", "serialized"),
      ("GENERATOR", "command"),
      ("GENERATOR_COMMAND", "python3 gen.py --short"),
      ("SIGNED_URL_TTL_SECS", "60"),
    ])
    .unwrap();
    assert_eq!(c.storage, StorageBackend::Memory);
    assert_eq!(c.consistency, ConsistencyMode::Serialized);
    assert_eq!(c.generator_command, vec!["python3", "gen.py", "--short"]);
    assert_eq!(c.signed_url_ttl, Duration::from_secs(60));
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(matches!(cfg(&[("PORT", "http")]), Err(ConfigError::Invalid { var: "PORT", .. })));
    assert!(matches!(cfg(&[("MAX_UPLOAD_BYTES", "0")]), Err(ConfigError::Invalid { var: "MAX_UPLOAD_BYTES", .. })));
    assert!(matches!(cfg(&[("GENERATOR", "openai")]), Err(ConfigError::Invalid { var: "OPENAI_API_KEY", .. })));
    assert!(matches!(cfg(&[("GENERATOR", "command")]), Err(ConfigError::Invalid { var: "GENERATOR_COMMAND", .. })));
    assert!(matches!(cfg(&[("STORAGE_BACKEND", "s3")]), Err(ConfigError::Invalid { .. })));
    assert!(matches!(cfg(&[("PUBLIC_BASE_URL", "ftp://x")]), Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn toml_file_supplies_prompts_and_fixtures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiz.toml");
    std::fs::write(
      &path,
      r#"
fixtures = ["a rainy bus stop", "my first apartment"]

[prompts]
interpretation_system = "custom system"
"#,
    )
    .unwrap();
    let c = cfg(&[("QUIZ_CONFIG_PATH", path.to_str().unwrap())]).unwrap();
    assert_eq!(c.fixtures.len(), 2);
    assert_eq!(c.prompts.interpretation_system, "custom system");
    // untouched prompt fields keep their defaults
    assert!(c.prompts.interpretation_user_template.contains("{author}"));
  }

  #[test]
  fn bundled_demo_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/quiz.toml");
    let file = load_file_config(path).unwrap();
    assert_eq!(file.fixtures.len(), 4);
    assert!(file.prompts.interpretation_user_template.contains("{author}"));
    assert_eq!(file.prompts.max_tokens, 100);
  }

  #[test]
  fn unreadable_toml_is_an_error() {
    assert!(matches!(cfg(&[("QUIZ_CONFIG_PATH", "/no/such/file.toml")]), Err(ConfigError::Read { .. })));
  }
}
