// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Queue service error: {0}")]
    QueueService(#[from] crate::port::QueueServiceError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] crate::port::OrchestratorError),

    /// The cancellation scope of the running unit was cancelled mid-operation
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Orchestrator failures get a cooldown instead of ending a monitor
    pub fn is_orchestrator(&self) -> bool {
        matches!(self, AppError::Orchestrator(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
