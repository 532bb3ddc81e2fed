// Port Layer - Interfaces for the queue service and compute orchestrator

pub mod orchestrator;
pub mod queue_service;

// Re-exports
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use queue_service::{QueueService, QueueServiceError};
