// Domain Layer - Pure controller rules and value snapshots

pub mod error;
pub mod naming;
pub mod queue;
pub mod task;
pub mod template;

// Re-exports
pub use error::DomainError;
pub use naming::{belongs_to_controller, deterministic_tag};
pub use queue::{Queue, QueueAttributes, QueueKind, QueueUrl, Tags};
pub use task::{
    ContainerOverride, DesiredState, DescribedTasks, LaunchedTasks, RunTaskRequest, Task,
    TaskFailure, TaskId, TaskPage, MISSING_REASON,
};
pub use template::resolve;
