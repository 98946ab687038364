//! Errors raised while talking to a completion provider

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Why a completion could not be produced
///
/// Callers that treat insights as optional only need the `Display` text;
/// the variants exist so tests and logs can tell a bad key from a quota hit.
#[derive(Error, Debug)]
pub enum LLMError {
    /// The provider answered with an unexpected status
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    /// The key was rejected
    #[error("The API key was rejected by the provider")]
    AuthenticationFailed,

    #[error("Provider quota exhausted: {0}")]
    RateLimitExceeded(String),

    /// The provider refused the request body
    #[error("Provider rejected the request: {0}")]
    InvalidRequest(String),

    #[error("Unknown model {0}")]
    ModelNotFound(String),

    /// Safety filters or an empty candidate list
    #[error("Completion blocked: {0}")]
    Blocked(String),

    #[error("Transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The body did not match the provider's schema
    #[error("Malformed provider response: {0}")]
    UnexpectedResponse(String),

    /// The provider could not be constructed
    #[error("Provider misconfigured: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// The credential itself is the problem, retrying with it is pointless
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::ConfigurationError(_))
    }
}
