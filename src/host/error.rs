use thiserror::Error;

use crate::base::DocumentUri;
use crate::semantic::SignatureError;

/// Failures reported by [`AnalysisHost`](super::AnalysisHost).
///
/// None of these describe the document content; syntax and semantic
/// problems are always diagnostics.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("update for {uri} at version {incoming} is not newer than version {latest}")]
    OutOfOrder {
        uri: DocumentUri,
        latest: i32,
        incoming: i32,
    },

    #[error("update for {uri} at version {version} was superseded before it finished")]
    Superseded { uri: DocumentUri, version: i32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error(transparent)]
    Signatures(#[from] SignatureError),

    #[error("analysis host has been shut down")]
    ShutDown,
}

impl AnalysisError {
    /// Whether the update lost a race with a newer one and can be ignored
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::OutOfOrder { .. } | Self::Superseded { .. })
    }
}
