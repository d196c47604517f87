use connectors::error::ClientError;
use engine_core::error::CheckpointError;
use model::strategy::InvalidStrategy;
use thiserror::Error;

/// Top-level errors for the storage migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Rejected before any checkpoint write.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidStrategy(#[from] InvalidStrategy),

    /// Remote entity service failure.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Durable store failure. Fatal regardless of `continue_on_error`.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A worker task panicked or was cancelled.
    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Failure writing the tabular report.
    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A row or response had an impossible shape.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Render an error and its cause chain the way it is stored on an `ERRORED`
/// checkpoint row.
pub fn error_trace(err: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str("\ncaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}
