pub mod types;
pub mod normalize;
pub mod prompt;
pub mod validation;
pub mod retry;
pub mod overrides;
pub mod ollama;
pub mod orchestrator;

pub use types::*;
pub use normalize::*;
pub use prompt::*;
pub use validation::*;
pub use retry::*;
pub use overrides::*;
pub use ollama::*;
pub use orchestrator::*;

use thiserror::Error;

/// Failures at the model boundary (daemon unreachable, HTTP fault, bad body).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// The model answered, but not with a usable six-key boolean object.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("No JSON object found in model output")]
    NoJsonObject,

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Missing required key: {0}")]
    MissingKey(String),

    #[error("Value for {key} is not boolean-like: {value}")]
    NotBoolean { key: String, value: String },
}

/// One failed classification attempt. Both kinds are retried identically.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
