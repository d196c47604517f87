use thiserror::Error;

/// Errors surfaced by an entity service client implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-success status code.
    #[error("service returned {status} for {path}: {message}")]
    Http {
        status: u16,
        path: String,
        message: String,
    },

    /// Transport-level failure (connection, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("entity {0} not found")]
    NotFound(String),

    /// The caller is not the owner of the referenced storage location.
    #[error("not the owner of storage location {0}")]
    StorageLocationDenied(i64),

    /// Request or response payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The response was well-formed but missing something the caller needs.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}
