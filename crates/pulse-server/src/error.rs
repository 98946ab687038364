//! Error types for the analysis service

use crate::pipeline::Stage;
use crate::session::{SessionId, SessionStatus};
use thiserror::Error;

/// Errors raised by the session registry, report store, runner and facade
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request rejected before any session was created
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session with this id exists
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// The session exists but has no report yet
    #[error("Report for session {id} is not ready (status {status})")]
    NotReady { id: SessionId, status: SessionStatus },

    /// A session mutation would break its lifecycle rules
    #[error("Invalid transition for session {id}: {reason}")]
    InvalidTransition { id: SessionId, reason: String },

    /// A report was already stored for this session
    #[error("Report already stored for session {0}")]
    AlreadyStored(SessionId),

    /// A shared map lock was poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// A pipeline stage failed
    #[error("{stage} failed: {detail}")]
    StageFailure { stage: Stage, detail: String },

    /// Analysis work failed outside a stage boundary
    #[error(transparent)]
    Analysis(#[from] pulse_analysis::AnalysisError),

    /// Invalid service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn poisoned<E: std::fmt::Display>(what: &str, err: E) -> Self {
        Self::LockPoisoned(format!("{what}: {err}"))
    }
}

impl From<pulse_utils::ConfigError> for ServiceError {
    fn from(err: pulse_utils::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
