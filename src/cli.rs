use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{self, normalize_ollama_url, LabelerConfig};
use crate::pipeline::labeling::{RetryPolicy, DEFAULT_OLLAMA_URL};

/// Label lumbar spinal stenosis per level from radiology reports with a local LLM.
#[derive(Parser, Debug)]
#[command(name = "lumbar-labeler")]
#[command(version)]
pub struct Cli {
    /// Input table (.xlsx, .xlsm, .xls, .csv or .tsv)
    #[arg(long)]
    pub input: PathBuf,

    /// Output CSV, rewritten after every chunk
    #[arg(long, default_value = config::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Column holding the report text
    #[arg(long, default_value = config::DEFAULT_TEXT_COLUMN)]
    pub text_col: String,

    /// Column holding the record identifier
    #[arg(long, default_value = config::DEFAULT_ID_COLUMN)]
    pub id_col: String,

    /// Ollama model name
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    pub model: String,

    /// Rows per checkpoint
    #[arg(long, default_value_t = config::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Retries after the first failed attempt
    #[arg(long, default_value_t = config::DEFAULT_RETRIES)]
    pub retries: u32,

    /// Wait between attempts, in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_BACKOFF_MS)]
    pub backoff_ms: u64,

    /// Ollama address
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Skip ids already present in the output file
    #[arg(long)]
    pub resume: bool,

    /// Add a `source` column (model, fallback, override:<rule>)
    #[arg(long)]
    pub source_column: bool,
}

impl From<Cli> for LabelerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            input: cli.input,
            output: cli.output,
            text_column: cli.text_col,
            id_column: cli.id_col,
            model: cli.model,
            chunk_size: cli.chunk_size,
            retry: RetryPolicy {
                max_retries: cli.retries,
                backoff: Duration::from_millis(cli.backoff_ms),
            },
            ollama_url: normalize_ollama_url(&cli.ollama_url),
            timeout_secs: cli.timeout_secs,
            resume: cli.resume,
            source_column: cli.source_column,
        }
    }
}
