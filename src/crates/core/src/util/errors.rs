//! Error types shared across the runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A lifecycle call arrived in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("View error: {0}")]
    View(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Line provider error: {0}")]
    LineProvider(String),

    /// Raised when the option race ends without a winner and without cancellation.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("State machine error: {0}")]
    StateMachine(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn view(msg: impl Into<String>) -> Self {
        Self::View(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn state_machine(msg: impl Into<String>) -> Self {
        Self::StateMachine(msg.into())
    }

    /// Errors that end the running session instead of being reported and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsistencyViolation(_) | Self::StateMachine(_) | Self::Internal(_))
    }
}

pub type ParleyResult<T> = Result<T, ParleyError>;
