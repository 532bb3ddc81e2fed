// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Container environment override template is malformed: {0}")]
    InvalidOverrideTemplate(String),

    #[error("Environment variable already defined in overrides: {0}")]
    DuplicateOverride(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
