//! Error taxonomy for the ingestion pipeline.
//!
//! Every variant is fatal: the pipeline never retries and never isolates a
//! failing stage from the others.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to connect to store at {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("write of [{bins}] to record {key} failed: {reason}")]
    Write {
        key: String,
        bins: String,
        reason: String,
    },

    #[error("identifier generation failed: {reason}")]
    IdentifierGeneration { reason: String },

    #[error("invalid configuration: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("invalid topology: {0}")]
    Topology(String),

    #[error("consumer on port {port} disconnected before the pipeline drained")]
    Disconnected { port: String },

    #[error("stage {stage} was aborted: {reason}")]
    StageAborted { stage: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
