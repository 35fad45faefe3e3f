use crate::outcome::{IssueType, Outcome};
use thiserror::Error;

/// Simulator error types
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Case not found: {0}")]
    CaseNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Another request for the same session is still outstanding
    #[error("Session busy: {0}")]
    Busy(String),

    #[error("Cannot {action} while session is {phase}")]
    InvalidTransition { phase: String, action: String },

    #[error("Session is no longer active")]
    Inactive,

    /// Request content the simulator cannot act on
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Handover note must be at least {min} characters")]
    HandoverTooShort { min: usize },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SimError {
    /// Map the error onto an outcome issue type
    pub fn issue_type(&self) -> IssueType {
        match self {
            SimError::CaseNotFound(_) | SimError::SessionNotFound(_) => IssueType::NotFound,
            SimError::Busy(_) => IssueType::Conflict,
            SimError::InvalidTransition { .. } | SimError::Inactive => IssueType::BusinessRule,
            SimError::HandoverTooShort { .. } | SimError::InvalidInput(_) => IssueType::Invalid,
            SimError::Model(_) => IssueType::Transient,
            SimError::Storage(_) => IssueType::Exception,
        }
    }

    pub fn to_outcome(&self) -> Outcome {
        Outcome::error(self.issue_type(), &self.to_string())
    }
}
