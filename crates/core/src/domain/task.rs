// Compute Task Domain Model

/// Task identifier (orchestrator ARN)
pub type TaskId = String;

/// Failure reason the orchestrator reports for a task that no longer exists
pub const MISSING_REASON: &str = "MISSING";

/// Desired state of a task as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesiredState {
    Running,
    Pending,
    Stopped,
    /// Any other status, kept verbatim and treated as "not stopped"
    Other(String),
}

impl DesiredState {
    pub fn parse(status: &str) -> Self {
        match status {
            "RUNNING" => DesiredState::Running,
            "PENDING" => DesiredState::Pending,
            "STOPPED" => DesiredState::Stopped,
            other => DesiredState::Other(other.to_string()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, DesiredState::Stopped)
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Running => write!(f, "RUNNING"),
            DesiredState::Pending => write!(f, "PENDING"),
            DesiredState::Stopped => write!(f, "STOPPED"),
            DesiredState::Other(status) => write!(f, "{}", status),
        }
    }
}

/// Running compute unit snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub cluster: String,
    pub started_by: Option<String>,
    pub desired_state: DesiredState,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        cluster: impl Into<String>,
        started_by: Option<String>,
        desired_state: DesiredState,
    ) -> Self {
        Self {
            id: id.into(),
            cluster: cluster.into(),
            started_by,
            desired_state,
        }
    }
}

/// Partial failure reported inside an otherwise successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub arn: Option<String>,
    pub reason: String,
    pub detail: Option<String>,
}

impl TaskFailure {
    pub fn new(arn: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            arn,
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.reason == MISSING_REASON
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.arn, &self.detail) {
            (Some(arn), Some(detail)) => write!(f, "{} ({}): {}", self.reason, arn, detail),
            (Some(arn), None) => write!(f, "{} ({})", self.reason, arn),
            (None, Some(detail)) => write!(f, "{}: {}", self.reason, detail),
            (None, None) => write!(f, "{}", self.reason),
        }
    }
}

/// One page of task identifiers
#[derive(Debug, Clone, Default)]
pub struct TaskPage {
    pub task_ids: Vec<TaskId>,
    pub next_token: Option<String>,
}

/// Result of describing a set of tasks
#[derive(Debug, Clone, Default)]
pub struct DescribedTasks {
    pub tasks: Vec<Task>,
    pub failures: Vec<TaskFailure>,
}

impl DescribedTasks {
    /// Whether the response shows `task_id` stopped or no longer known
    pub fn is_gone(&self, task_id: &str) -> bool {
        match self.tasks.iter().find(|task| task.id == task_id) {
            Some(task) => task.desired_state.is_stopped(),
            None => self
                .failures
                .iter()
                .any(|failure| {
                    failure.is_missing() && failure.arn.as_deref().map_or(true, |arn| arn == task_id)
                }),
        }
    }
}

/// Result of a launch request
#[derive(Debug, Clone, Default)]
pub struct LaunchedTasks {
    pub tasks: Vec<Task>,
    pub failures: Vec<TaskFailure>,
}

/// Environment override for one container of the task definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOverride {
    pub container_name: String,
    /// Ordered (key, resolved value) pairs
    pub environment: Vec<(String, String)>,
}

/// Launch request for a single task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub launch_type: String,
    pub started_by: String,
    pub container_override: Option<ContainerOverride>,
}
