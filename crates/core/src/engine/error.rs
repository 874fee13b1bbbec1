use thiserror::Error;

use crate::ticket::{ParseEnumError, StoreError, TicketId};

/// Errors returned by every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Bad input: empty required field or unknown enum value.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced ticket does not exist in the caller's collection.
    #[error("Ticket not found: {0}")]
    NotFound(TicketId),

    /// No identity has been resolved yet.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The storage backend failed, or the dispatch loop is gone.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl EngineError {
    pub fn missing_field(field: &str) -> Self {
        EngineError::Validation(format!("{field} is required"))
    }

    /// Short machine-readable kind, used for metric labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(_) => "not_found",
            EngineError::NotAuthenticated => "not_authenticated",
            EngineError::BackendUnavailable(_) => "backend_unavailable",
        }
    }

    /// Whether resubmitting the same call can succeed without changing it.
    ///
    /// Only a pending identity resolves on its own. Backend failures are
    /// surfaced to the caller, who owns the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::NotAuthenticated)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::BackendUnavailable(err.to_string())
    }
}

impl From<ParseEnumError> for EngineError {
    fn from(err: ParseEnumError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
