use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::pipeline::batch::{BatchConfig, OutputLayout};
use crate::pipeline::labeling::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "lumbar-labeler";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OUTPUT: &str = "labeled_output.csv";
/// Default report-text column ("exam result").
pub const DEFAULT_TEXT_COLUMN: &str = "검사결과";
/// Default identifier column ("patient number").
pub const DEFAULT_ID_COLUMN: &str = "환자번호";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "lumbar_labeler_lib=info"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    #[error("Invalid Ollama URL: {0}")]
    InvalidUrl(String),

    #[error("Column name must not be empty: {0}")]
    EmptyColumn(&'static str),
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelerConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub text_column: String,
    pub id_column: String,
    pub model: String,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub ollama_url: String,
    pub timeout_secs: u64,
    pub resume: bool,
    pub source_column: bool,
}

impl LabelerConfig {
    /// Defaults for everything except the input path.
    pub fn with_input(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            text_column: DEFAULT_TEXT_COLUMN.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            model: DEFAULT_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy {
                max_retries: DEFAULT_RETRIES,
                backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            },
            ollama_url: crate::pipeline::labeling::DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            resume: false,
            source_column: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.text_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn("text"));
        }
        if self.id_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn("id"));
        }
        validate_model_name(&self.model)?;
        validate_base_url(&self.ollama_url)?;
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            output_path: self.output.clone(),
            layout: OutputLayout {
                id_column: self.id_column.clone(),
                include_source: self.source_column,
            },
            chunk_size: self.chunk_size,
        }
    }
}

static MODEL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*)?(:[a-zA-Z0-9._-]+)?$")
        .expect("static regex")
});

/// Ollama naming convention: `[namespace/]model[:tag]`, one namespace at most.
pub fn validate_model_name(name: &str) -> Result<(), ConfigError> {
    if MODEL_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidModelName(name.to_string()))
    }
}

/// Must be an http(s) URL with a host.
pub fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let after_scheme = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;

    let host = after_scheme.split(['/', ':']).next().unwrap_or("");
    if host.is_empty() && !after_scheme.starts_with('[') {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Accepts `host:port` as well as full URLs, the way `OLLAMA_HOST` is often set.
pub fn normalize_ollama_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
