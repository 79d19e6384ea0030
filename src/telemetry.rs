//! Tracing setup for the quiz server.
//!
//! LOG_LEVEL is an `EnvFilter` directive string ("debug", or per-target
//! directives). LOG_FORMAT picks "pretty" (default) or "json".
//!
//! Domain events log under the `quiz` target, infrastructure (storage,
//! generators, startup) under `realpick`. The tower-http TraceLayer adds a
//! span per request on top.

use std::str::FromStr;

use tracing::warn;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,quiz=debug,realpick=debug,tower_http=info,axum=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub format: LogFormat,
    /// Raw LOG_FORMAT value that failed to parse; reported once logging is up.
    pub rejected_format: Option<String>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let directives = lookup("LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let raw_format = lookup("LOG_FORMAT").unwrap_or_default();
        let (format, rejected_format) = match raw_format.parse::<LogFormat>() {
            Ok(f) => (f, None),
            Err(_) => (LogFormat::Pretty, Some(raw_format)),
        };
        Self { directives, format, rejected_format }
    }
}

pub fn init_tracing() {
    init_with(&LogSettings::from_env());
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_with(settings: &LogSettings) {
    let filter = EnvFilter::try_new(&settings.directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // json() changes the builder type, so each arm installs on its own.
    let installed = match settings.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    };

    if installed {
        if let Some(raw) = &settings.rejected_format {
            warn!(target: "realpick", value = %raw, "Unknown LOG_FORMAT, using pretty output");
        }
    }
}
