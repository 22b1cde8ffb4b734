pub mod cli;
pub mod config;
pub mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::LabelerConfig;
use pipeline::batch::{read_existing_output, read_reports, BatchError, BatchRunner};
use pipeline::labeling::{ChatClient, OllamaChatClient, ReportLabeler, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Model client error: {0}")]
    Transport(#[from] TransportError),
}

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = LabelerConfig::from(cli::Cli::parse());
    match label_file(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Labeling run failed");
            ExitCode::FAILURE
        }
    }
}

/// Label every report in `config.input`, checkpointing to `config.output`.
///
/// Input problems (format, columns) are reported before any model call.
pub fn label_file(config: &LabelerConfig) -> Result<(), RunError> {
    config.validate()?;

    let run_id = uuid::Uuid::new_v4();
    let _span = tracing::info_span!("label_file", run_id = %run_id).entered();

    let reports = read_reports(&config.input, &config.text_column, &config.id_column)?;
    let previous = if config.resume {
        let rows = read_existing_output(&config.output, &config.id_column)?;
        tracing::info!(rows = rows.len(), "Resuming from existing output");
        rows
    } else {
        Vec::new()
    };

    let client = OllamaChatClient::new(&config.ollama_url, config.timeout_secs)?;
    preflight(&client, &config.model);

    let labeler = ReportLabeler::new(Box::new(client), &config.model, config.retry);
    BatchRunner::new(&labeler, config.batch_config()).run(&reports, previous)?;
    Ok(())
}

/// Warn early about a missing model or unreachable daemon. Never fatal.
fn preflight(client: &OllamaChatClient, model: &str) {
    match client.is_model_available(model) {
        Ok(true) => tracing::info!(model = %model, url = %client.base_url(), "Model confirmed"),
        Ok(false) => tracing::warn!(
            model = %model,
            url = %client.base_url(),
            "Model not installed in Ollama; reports will be flagged for review"
        ),
        Err(e) => tracing::warn!(error = %e, "Cannot reach Ollama; reports will be flagged for review"),
    }
}
