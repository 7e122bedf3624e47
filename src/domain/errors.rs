//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Upstream credential is missing. Never shown verbatim to callers.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream AI error: {0}")]
    Upstream(String),

    #[error("Upstream AI request timed out")]
    Timeout,

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DomainError {
    /// Message safe to put in an HTTP body.
    ///
    /// Upstream failures collapse to one generic text so callers cannot tell a
    /// missing credential from a provider outage.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Configuration(_) | DomainError::Upstream(_) => {
                "AI service is temporarily unavailable".to_string()
            }
            DomainError::Timeout => "AI service did not respond in time".to_string(),
            DomainError::Repo(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}
