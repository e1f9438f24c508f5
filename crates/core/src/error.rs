//! Error types for the Catboard edge handler.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each stage of the request pipeline has its own error variant, and
//! [`PipelineError`] is what reaches the single failure boundary.

use thiserror::Error;

/// Every failure the request pipeline can produce.
///
/// The gateway turns any of these into `500 text/plain` with the
/// `Display` text as body, so clients cannot tell the kinds apart.
#[derive(Debug, Error)]
pub enum PipelineError {
    // --- Context builder ---
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    // --- Computation delegate ---
    #[error("Delegate error: {0}")]
    Delegate(#[from] DelegateError),

    // --- Response augmenter ---
    #[error("Augmentation error: {0}")]
    Augment(#[from] AugmentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Response emitter ---
    #[error("Invalid response status from delegate: {0}")]
    InvalidStatus(u16),
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

// --- Stage errors ---

#[derive(Debug, Clone, Error)]
pub enum DelegateError {
    #[error("Engine bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Computation failed in {delegate}: {reason}")]
    Execution { delegate: String, reason: String },

    #[error("Computation timed out in {delegate} after {timeout_ms}ms")]
    Timeout { delegate: String, timeout_ms: u64 },

    #[error("Invalid delegate output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("Delegate body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Delegate body is not a JSON object")]
    NotAnObject,

    #[error("Delegate body has no `data` object")]
    MissingData,
}
