//! Domain errors
//!
//! Errors produced by aggregate business rules. A domain error means the
//! command itself was rejected, not that persistence or transport failed.

/// Errors raised by aggregate command methods
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Command input violated a business rule
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Command issued against an aggregate in the wrong status
    #[error("Invalid transition: {command} not allowed in status {status}")]
    InvalidTransition {
        command: &'static str,
        status: String,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn invalid_transition(command: &'static str, status: impl ToString) -> Self {
        DomainError::InvalidTransition {
            command,
            status: status.to_string(),
        }
    }

    /// Check whether this is a transition error
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidTransition { .. })
    }
}
