//! Error taxonomy for the retrieval and generation core.

use thiserror::Error;

/// Errors raised by context assembly, ranking, and generation.
///
/// Collaborator failures (stores, embedding providers, the generation
/// gateway) arrive as opaque [`anyhow::Error`]s and are wrapped here so
/// callers can still tell a missing chapter from a failed model call.
#[derive(Debug, Error)]
pub enum RagError {
    /// A referenced chapter or novel does not exist.
    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: i64 },

    /// A stored vector disagrees with the query embedding's dimension.
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The embedding provider failed or returned a malformed batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation call failed. Carries the upstream status/message.
    #[error("generation request failed: {0}")]
    Gateway(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
