// Compute Orchestrator Port (Interface)
// Every response that can carry a `failures` list must be checked by the caller
// in addition to the transport-level result.

use crate::domain::{DescribedTasks, LaunchedTasks, RunTaskRequest, Task, TaskId, TaskPage};
use async_trait::async_trait;
use thiserror::Error;

/// Most task ids one describe call accepts
pub const DESCRIBE_BATCH_LIMIT: usize = 100;

/// Every launch requests exactly one task (single consumer per ordered queue)
pub const TASKS_PER_LAUNCH: i32 = 1;

/// Orchestrator errors
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Compute orchestrator port
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// One page of task ids running in `cluster`
    async fn list_tasks(
        &self,
        cluster: &str,
        page_token: Option<String>,
    ) -> Result<TaskPage, OrchestratorError>;

    /// Describe up to `DESCRIBE_BATCH_LIMIT` tasks
    async fn describe_tasks(
        &self,
        cluster: &str,
        task_ids: &[TaskId],
    ) -> Result<DescribedTasks, OrchestratorError>;

    /// Launch a single task
    async fn run_task(&self, request: &RunTaskRequest) -> Result<LaunchedTasks, OrchestratorError>;

    /// Request a task be stopped
    async fn stop_task(
        &self,
        cluster: &str,
        task_id: &str,
        reason: &str,
    ) -> Result<Task, OrchestratorError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{DesiredState, TaskFailure, MISSING_REASON};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// How `run_task` responds
    #[derive(Debug, Clone)]
    pub enum LaunchBehavior {
        /// Start a RUNNING task
        Launch,
        /// Respond successfully with a failure entry
        Failure(String),
        /// Transport error
        Error(String),
    }

    /// Simulated cluster recording every request
    pub struct MockOrchestrator {
        tasks: Mutex<Vec<Task>>,
        launch: Mutex<LaunchBehavior>,
        stop_error: Mutex<Option<String>>,
        list_error: Mutex<Option<String>>,
        run_requests: Mutex<Vec<RunTaskRequest>>,
        stop_requests: Mutex<Vec<TaskId>>,
        describe_calls: Mutex<usize>,
        page_size: usize,
        next_id: AtomicU64,
    }
    impl Default for MockOrchestrator {
        fn default() -> Self {
            Self::new()
        }
    }
    impl MockOrchestrator {
        pub fn new() -> Self {
            Self::with_page_size(DESCRIBE_BATCH_LIMIT)
        }
        pub fn with_page_size(page_size: usize) -> Self {
            Self {
                tasks: Mutex::new(Vec::new()),
                launch: Mutex::new(LaunchBehavior::Launch),
                stop_error: Mutex::new(None),
                list_error: Mutex::new(None),
                run_requests: Mutex::new(Vec::new()),
                stop_requests: Mutex::new(Vec::new()),
                describe_calls: Mutex::new(0),
                page_size: page_size.max(1),
                next_id: AtomicU64::new(1),
            }
        }
        fn allocate_id(&self) -> TaskId {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            format!("arn:aws:ecs:mock:task/{}", n)
        }
        /// Place a task on the cluster as if something else had started it
        pub fn seed_task(
            &self,
            cluster: &str,
            started_by: Option<&str>,
            desired_state: DesiredState,
        ) -> Task {
            let task = Task::new(
                self.allocate_id(),
                cluster,
                started_by.map(str::to_string),
                desired_state,
            );
            self.tasks.lock().unwrap().push(task.clone());
            task
        }
        pub fn set_desired_state(&self, task_id: &str, desired_state: DesiredState) {
            if let Some(task) = self
                .tasks
                .lock()
                .unwrap()
                .iter_mut()
                .find(|t| t.id == task_id)
            {
                task.desired_state = desired_state;
            }
        }
        /// Forget a task entirely (describe then reports MISSING)
        pub fn evict_task(&self, task_id: &str) {
            self.tasks.lock().unwrap().retain(|t| t.id != task_id);
        }
        pub fn set_launch_behavior(&self, behavior: LaunchBehavior) {
            *self.launch.lock().unwrap() = behavior;
        }
        pub fn set_stop_error(&self, message: Option<&str>) {
            *self.stop_error.lock().unwrap() = message.map(str::to_string);
        }
        pub fn set_list_error(&self, message: Option<&str>) {
            *self.list_error.lock().unwrap() = message.map(str::to_string);
        }
        pub fn task(&self, task_id: &str) -> Option<Task> {
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
        }
        /// Tasks whose desired state is not STOPPED
        pub fn live_tasks(&self) -> Vec<Task> {
            self.tasks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| !t.desired_state.is_stopped())
                .cloned()
                .collect()
        }
        pub fn run_requests(&self) -> Vec<RunTaskRequest> {
            self.run_requests.lock().unwrap().clone()
        }
        pub fn stop_requests(&self) -> Vec<TaskId> {
            self.stop_requests.lock().unwrap().clone()
        }
        pub fn describe_calls(&self) -> usize {
            *self.describe_calls.lock().unwrap()
        }
    }
    #[async_trait]
    impl Orchestrator for MockOrchestrator {
        async fn list_tasks(
            &self,
            cluster: &str,
            page_token: Option<String>,
        ) -> Result<TaskPage, OrchestratorError> {
            if let Some(message) = self.list_error.lock().unwrap().as_ref() {
                return Err(OrchestratorError::Request(message.clone()));
            }
            let offset: usize = match page_token {
                Some(token) => token
                    .parse()
                    .map_err(|_| OrchestratorError::Request(format!("bad token {}", token)))?,
                None => 0,
            };
            // Mirrors the default listing filter: desired state RUNNING only
            let ids: Vec<TaskId> = self
                .live_tasks()
                .into_iter()
                .filter(|t| t.cluster == cluster)
                .map(|t| t.id)
                .collect();
            let end = (offset + self.page_size).min(ids.len());
            Ok(TaskPage {
                task_ids: ids.get(offset..end).map(<[_]>::to_vec).unwrap_or_default(),
                next_token: (end < ids.len()).then(|| end.to_string()),
            })
        }
        async fn describe_tasks(
            &self,
            _cluster: &str,
            task_ids: &[TaskId],
        ) -> Result<DescribedTasks, OrchestratorError> {
            *self.describe_calls.lock().unwrap() += 1;
            if task_ids.len() > DESCRIBE_BATCH_LIMIT {
                return Err(OrchestratorError::Request(format!(
                    "too many task ids: {}",
                    task_ids.len()
                )));
            }
            let mut described = DescribedTasks::default();
            for id in task_ids {
                match self.task(id) {
                    Some(task) => described.tasks.push(task),
                    None => described
                        .failures
                        .push(TaskFailure::new(Some(id.clone()), MISSING_REASON)),
                }
            }
            Ok(described)
        }
        async fn run_task(
            &self,
            request: &RunTaskRequest,
        ) -> Result<LaunchedTasks, OrchestratorError> {
            self.run_requests.lock().unwrap().push(request.clone());
            let behavior = self.launch.lock().unwrap().clone();
            match behavior {
                LaunchBehavior::Launch => {
                    let task = Task::new(
                        self.allocate_id(),
                        request.cluster.clone(),
                        Some(request.started_by.clone()),
                        DesiredState::Running,
                    );
                    self.tasks.lock().unwrap().push(task.clone());
                    Ok(LaunchedTasks {
                        tasks: vec![task],
                        failures: Vec::new(),
                    })
                }
                LaunchBehavior::Failure(reason) => Ok(LaunchedTasks {
                    tasks: Vec::new(),
                    failures: vec![TaskFailure::new(None, reason)],
                }),
                LaunchBehavior::Error(message) => Err(OrchestratorError::Request(message)),
            }
        }
        async fn stop_task(
            &self,
            _cluster: &str,
            task_id: &str,
            _reason: &str,
        ) -> Result<Task, OrchestratorError> {
            self.stop_requests.lock().unwrap().push(task_id.to_string());
            if let Some(message) = self.stop_error.lock().unwrap().as_ref() {
                return Err(OrchestratorError::Request(message.clone()));
            }
            self.set_desired_state(task_id, DesiredState::Stopped);
            self.task(task_id)
                .ok_or_else(|| OrchestratorError::Request(format!("unknown task {}", task_id)))
        }
    }
}
