use thiserror::Error;

use super::GraphValidationError;

/// Errors produced while loading a graph definition from RON.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphLoaderError {
    /// A [RON](ron) Error
    #[error("Could not parse RON: {0}")]
    RonSpannedError(#[from] ron::error::SpannedError),
    #[error("Could not write RON: {0}")]
    RonError(#[from] ron::Error),
    #[error("Graph does not satisfy constraints: {0}")]
    InconsistentGraphError(#[from] GraphValidationError),
}
