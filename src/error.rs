//! Error types for the composition engine
//!
//! Configuration and catalog problems are rejected up front; graph contract
//! violations surface as loud errors rather than silent misbehavior.

use thiserror::Error;

use crate::audio::NodeId;
use crate::catalog::SoundCategory;

/// Errors that can occur while building or running the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The loader has not marked this category ready yet
    #[error("buffer catalog for {0} is not ready")]
    CatalogNotReady(SoundCategory),

    /// A selection was attempted against a category with no buffers
    #[error("buffer catalog for {0} has no entries")]
    EmptyCatalog(SoundCategory),

    /// A config field failed validation
    #[error("invalid config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// Config JSON could not be parsed
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A graph operation referenced a node that does not exist (or was disposed)
    #[error("unknown audio node {0}")]
    UnknownNode(NodeId),

    /// A graph operation targeted the wrong kind of node
    #[error("audio node {node} is a {actual}, expected {expected}")]
    NodeKindMismatch {
        node: NodeId,
        expected: &'static str,
        actual: &'static str,
    },

    /// A player was started before any buffer was assigned to it
    #[error("player {0} was started with no source buffer")]
    NoSource(NodeId),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::CatalogNotReady(SoundCategory::Loops);
        assert!(err.to_string().contains("loops"));

        let err = EngineError::NodeKindMismatch {
            node: NodeId::from_raw(7),
            expected: "player",
            actual: "panner",
        };
        assert!(err.to_string().contains("7"));
        assert!(err.to_string().contains("player"));
        assert!(err.to_string().contains("panner"));
    }
}
