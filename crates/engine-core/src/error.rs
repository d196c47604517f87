use thiserror::Error;

/// Errors from the durable checkpoint store. All of these are fatal to the
/// engine: the checkpoint is the source of truth for resumption and must not
/// drift from remote state.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to open checkpoint at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("checkpoint query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored integer code did not decode to a known status or type.
    #[error("corrupt checkpoint row: {0}")]
    Corrupt(String),

    /// An outcome update matched no row.
    #[error("no checkpoint row for {0}")]
    MissingRow(String),
}
