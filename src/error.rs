//! Error types for the compliance core.
//!
//! Checker and enrichment errors are absorbed at the lowest layer that can
//! handle them; only [`OrchestratorError`] ever reaches a workflow caller.

use thiserror::Error;

/// Error raised from inside `Checker::analyze`.
///
/// Malformed project data is not an error; checkers default missing or
/// mistyped keys.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckerError {
    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// Error from the enrichment endpoint. Always converted into a fallback.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("enrichment API key not configured")]
    MissingCredential,

    #[error("enrichment request failed: {0}")]
    Network(String),

    #[error("enrichment API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse enrichment response: {0}")]
    Parse(String),
}

/// Fatal workflow error, raised before a session is created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("invalid project id {0:?}: must be non-empty and contain no whitespace")]
    InvalidProjectId(String),
}
