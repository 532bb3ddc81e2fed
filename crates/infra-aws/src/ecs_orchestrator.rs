// ECS implementation of Orchestrator

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{self as ecs, KeyValuePair, LaunchType, TaskOverride};
use aws_sdk_ecs::Client;
use msgdelivery_core::domain::{
    ContainerOverride, DesiredState, DescribedTasks, LaunchedTasks, RunTaskRequest, Task,
    TaskFailure, TaskId, TaskPage,
};
use msgdelivery_core::port::orchestrator::TASKS_PER_LAUNCH;
use msgdelivery_core::port::{Orchestrator, OrchestratorError};
use tracing::debug;

pub struct EcsOrchestrator {
    client: Client,
}

impl EcsOrchestrator {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn request_error<E>(err: E) -> OrchestratorError
where
    E: std::error::Error,
{
    OrchestratorError::Request(DisplayErrorContext(err).to_string())
}

fn to_task(task: &ecs::Task) -> Result<Task, OrchestratorError> {
    let id = task
        .task_arn()
        .ok_or_else(|| OrchestratorError::MalformedResponse("task without ARN".to_string()))?;
    Ok(Task::new(
        id,
        task.cluster_arn().unwrap_or_default(),
        task.started_by().map(str::to_string),
        DesiredState::parse(task.desired_status().unwrap_or_default()),
    ))
}

fn to_tasks(tasks: &[ecs::Task]) -> Result<Vec<Task>, OrchestratorError> {
    tasks.iter().map(to_task).collect()
}

fn to_failures(failures: &[ecs::Failure]) -> Vec<TaskFailure> {
    failures
        .iter()
        .map(|failure| TaskFailure {
            arn: failure.arn().map(str::to_string),
            reason: failure.reason().unwrap_or("UNKNOWN").to_string(),
            detail: failure.detail().map(str::to_string),
        })
        .collect()
}

fn to_task_override(container: &ContainerOverride) -> TaskOverride {
    let environment = container.environment.iter().map(|(name, value)| {
        KeyValuePair::builder().name(name).value(value).build()
    });
    let container_override = environment
        .fold(
            ecs::ContainerOverride::builder().name(&container.container_name),
            |builder, pair| builder.environment(pair),
        )
        .build();

    TaskOverride::builder()
        .container_overrides(container_override)
        .build()
}

#[async_trait]
impl Orchestrator for EcsOrchestrator {
    async fn list_tasks(
        &self,
        cluster: &str,
        page_token: Option<String>,
    ) -> Result<TaskPage, OrchestratorError> {
        let output = self
            .client
            .list_tasks()
            .cluster(cluster)
            .set_next_token(page_token)
            .send()
            .await
            .map_err(request_error)?;

        Ok(TaskPage {
            task_ids: output.task_arns().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_ids: &[TaskId],
    ) -> Result<DescribedTasks, OrchestratorError> {
        if task_ids.is_empty() {
            return Ok(DescribedTasks::default());
        }
        let output = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(task_ids.to_vec()))
            .send()
            .await
            .map_err(request_error)?;

        Ok(DescribedTasks {
            tasks: to_tasks(output.tasks())?,
            failures: to_failures(output.failures()),
        })
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<LaunchedTasks, OrchestratorError> {
        let overrides = request.container_override.as_ref().map(to_task_override);
        debug!(
            cluster = %request.cluster,
            started_by = %request.started_by,
            has_overrides = overrides.is_some(),
            "Sending RunTask"
        );

        let output = self
            .client
            .run_task()
            .cluster(&request.cluster)
            .task_definition(&request.task_definition)
            .launch_type(LaunchType::from(request.launch_type.as_str()))
            .started_by(&request.started_by)
            .count(TASKS_PER_LAUNCH)
            .set_overrides(overrides)
            .send()
            .await
            .map_err(request_error)?;

        Ok(LaunchedTasks {
            tasks: to_tasks(output.tasks())?,
            failures: to_failures(output.failures()),
        })
    }

    async fn stop_task(
        &self,
        cluster: &str,
        task_id: &str,
        reason: &str,
    ) -> Result<Task, OrchestratorError> {
        let output = self
            .client
            .stop_task()
            .cluster(cluster)
            .task(task_id)
            .reason(reason)
            .send()
            .await
            .map_err(request_error)?;

        let task = output.task().ok_or_else(|| {
            OrchestratorError::MalformedResponse(format!("StopTask returned no task for {}", task_id))
        })?;
        to_task(task)
    }
}
