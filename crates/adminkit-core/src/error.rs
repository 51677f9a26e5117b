// ── Error types ──
//
// Two layers, translated at the controller boundary: `ProviderError` is
// what a data provider rejects with (optional HTTP status and code),
// `CoreError` is what consumers see. Controllers never let an async
// failure escape -- it becomes `error` state on the derived view.

use std::sync::Arc;

use thiserror::Error;

// ── Provider layer ──────────────────────────────────────────────────

/// Failure reported by a [`DataProvider`](crate::provider::DataProvider).
///
/// The core treats any rejection uniformly as a fetch error; the status
/// and code are carried through for consumers that want to branch on them.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend answered with a non-success status.
    #[error("Gateway error (HTTP {status}): {message}")]
    Http {
        message: String,
        /// Backend-specific error code, if the response carried one.
        code: Option<String>,
        status: u16,
    },

    /// The backend could not be reached at all.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// A record the caller asked for does not exist.
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    /// The backend answered, but the payload was not understood.
    #[error("Malformed response: {message}")]
    Deserialization { message: String },

    /// The provider does not implement the requested operation.
    #[error("Operation not supported by this provider: {operation}")]
    Unsupported { operation: String },

    /// The request itself was invalid before it ever left the process.
    #[error("Invalid request: {message}")]
    Invalid { message: String },
}

impl ProviderError {
    /// HTTP status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

// ── Consumer layer ──────────────────────────────────────────────────

/// Unified error type exposed by controllers and the mutation writer.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Recoverable fetch failures (become `error` state) ────────────
    #[error("Fetch failed: {message}")]
    Fetch {
        message: String,
        code: Option<String>,
        status: Option<u16>,
    },

    /// One or more referenced ids could not be resolved.
    #[error("Could not resolve references in {resource}: {message}")]
    Resolution { resource: String, message: String },

    // ── Fail-fast configuration problems ─────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{resource} with id {id} not found")]
    NotFound { resource: String, id: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors held in shared view state are reference-counted so snapshots
/// stay cheaply cloneable.
pub type StateError = Arc<CoreError>;

// ── Conversion from the provider layer ───────────────────────────────

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http {
                message,
                code,
                status,
            } => CoreError::Fetch {
                message,
                code,
                status: Some(status),
            },
            ProviderError::Connection { message } => CoreError::Fetch {
                message,
                code: None,
                status: None,
            },
            ProviderError::NotFound { resource, id } => CoreError::NotFound { resource, id },
            ProviderError::Deserialization { message } => {
                CoreError::Internal(format!("Malformed provider response: {message}"))
            }
            ProviderError::Unsupported { operation } => CoreError::Config {
                message: format!("provider does not support {operation}"),
            },
            ProviderError::Invalid { message } => CoreError::Config { message },
        }
    }
}
