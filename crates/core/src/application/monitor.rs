// Queue Monitor - per-queue start/confirm/stop loop

use super::cancel::CancelToken;
use super::constants::{IDLE_STOP_REASON, ORCHESTRATOR_ERROR_COOLDOWN_FACTOR};
use super::context::ControllerContext;
use crate::domain::{deterministic_tag, Queue, QueueUrl, RunTaskRequest, Task};
use crate::error::{AppError, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of one activation, selects the next delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A task is tracked and serving the queue: poll again after the active interval
    Active,
    /// No task is serving the queue: poll again after the blank interval
    Blank,
}

/// Why a monitor loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The cycle's scope was cancelled
    Cancelled,
    /// An unexpected (non-orchestrator) error ended monitoring until the next cycle
    Abandoned,
}

/// Watches one ordered queue and keeps exactly one task running while it has work
pub struct QueueMonitor {
    queue_url: QueueUrl,
    queue_name: String,
    ctx: ControllerContext,
}

impl QueueMonitor {
    pub fn new(queue: &Queue, ctx: ControllerContext) -> Self {
        Self {
            queue_url: queue.url.clone(),
            queue_name: queue.name.clone(),
            ctx,
        }
    }

    /// Run activations until the scope is cancelled.
    ///
    /// Orchestrator errors cool down for `ORCHESTRATOR_ERROR_COOLDOWN_FACTOR` blank
    /// intervals and keep going; any other error ends the loop without rescheduling.
    pub async fn run(self, mut cancel: CancelToken) -> MonitorExit {
        info!(queue = %self.queue_name, "Starting monitor");
        let intervals = self.ctx.settings.intervals;

        let exit = loop {
            let delay = match self.activate(&mut cancel).await {
                Ok(Activation::Active) => intervals.active_poll,
                Ok(Activation::Blank) => intervals.blank_poll,
                Err(AppError::Cancelled) => break MonitorExit::Cancelled,
                Err(e) if e.is_orchestrator() => {
                    let cooldown = orchestrator_cooldown(intervals.blank_poll);
                    error!(
                        queue = %self.queue_name,
                        error = %e,
                        cooldown_secs = cooldown.as_secs(),
                        "Orchestrator error while monitoring queue"
                    );
                    cooldown
                }
                Err(e) => {
                    error!(
                        queue = %self.queue_name,
                        error = %e,
                        "Error while monitoring queue, monitoring suspended until next refresh"
                    );
                    break MonitorExit::Abandoned;
                }
            };

            debug!(queue = %self.queue_name, delay_secs = delay.as_secs(), "Checking queue again later");
            if !cancel.sleep(delay).await {
                break MonitorExit::Cancelled;
            }
        };

        info!(queue = %self.queue_name, exit = ?exit, "Done monitoring");
        exit
    }

    /// One state evaluation: confirm, start, stop or idle (in that precedence)
    pub async fn activate(&self, cancel: &mut CancelToken) -> Result<Activation> {
        let attributes = cancel
            .guard(self.ctx.queues.get_attributes(&self.queue_url))
            .await?;
        let threshold = self.ctx.settings.message_threshold;
        debug!(
            queue = %self.queue_name,
            visible = attributes.visible,
            in_flight = attributes.in_flight,
            "Polled queue attributes"
        );

        let tracked = self.ctx.registry.get(&self.queue_url);

        if attributes.visible >= threshold {
            if let Some(task) = &tracked {
                if self.confirm(task, cancel).await? {
                    return Ok(Activation::Active);
                }
            }
            if !self.ctx.registry.contains(&self.queue_url) {
                return self.start(cancel).await;
            }
            return Ok(Activation::Blank);
        }

        if attributes.is_drained() {
            if let Some(task) = tracked {
                self.stop(&task, cancel).await?;
            }
        }
        Ok(Activation::Blank)
    }

    /// Returns true while the tracked task is still wanted running; forgets it otherwise
    async fn confirm(&self, task: &Task, cancel: &mut CancelToken) -> Result<bool> {
        let described = cancel
            .guard(
                self.ctx
                    .orchestrator
                    .describe_tasks(&task.cluster, std::slice::from_ref(&task.id)),
            )
            .await?;
        for failure in &described.failures {
            warn!(
                queue = %self.queue_name,
                task_arn = %task.id,
                failure = %failure,
                "Describe reported a failure for tracked task"
            );
        }

        if described.is_gone(&task.id) {
            self.ctx.registry.release(&self.queue_url, &task.id);
            info!(
                queue = %self.queue_name,
                task_arn = %task.id,
                "Tracked task is stopped, forgetting it"
            );
            return Ok(false);
        }

        debug!(queue = %self.queue_name, task_arn = %task.id, "Task is already running");
        Ok(true)
    }

    async fn start(&self, cancel: &mut CancelToken) -> Result<Activation> {
        let settings = &self.ctx.settings;
        let started_by = deterministic_tag(&self.queue_name);

        // Tags are fetched per launch so tag edits apply without a restart
        let container_override = match &settings.container_override {
            Some(template) => {
                let tags = cancel
                    .guard(self.ctx.queues.list_tags(&self.queue_url))
                    .await?;
                Some(template.resolve(&tags))
            }
            None => None,
        };

        let request = RunTaskRequest {
            cluster: settings.cluster.clone(),
            task_definition: settings.task_definition.clone(),
            launch_type: settings.launch_type.clone(),
            started_by,
            container_override,
        };

        info!(
            queue = %self.queue_name,
            started_by = %request.started_by,
            "Messages are available, starting task"
        );
        let launched = cancel
            .guard(self.ctx.orchestrator.run_task(&request))
            .await?;

        if let Some(failure) = launched.failures.first() {
            error!(
                queue = %self.queue_name,
                failure = %failure,
                failure_count = launched.failures.len(),
                "Unable to start task"
            );
            return Ok(Activation::Blank);
        }
        let Some(task) = launched.tasks.into_iter().next() else {
            error!(queue = %self.queue_name, "Unable to start task, no task returned");
            return Ok(Activation::Blank);
        };

        let task_arn = task.id.clone();
        if self.ctx.registry.claim(&self.queue_url, task) {
            info!(queue = %self.queue_name, task_arn = %task_arn, "Task started");
        } else {
            // Reconciliation reclaimed a task meanwhile; the next scan stops the extra one
            warn!(
                queue = %self.queue_name,
                task_arn = %task_arn,
                "Queue was claimed concurrently, leaving started task to reconciliation"
            );
        }
        Ok(Activation::Active)
    }

    async fn stop(&self, task: &Task, cancel: &mut CancelToken) -> Result<()> {
        info!(
            queue = %self.queue_name,
            task_arn = %task.id,
            "Messages are done processing, stopping task"
        );
        cancel
            .guard(
                self.ctx
                    .orchestrator
                    .stop_task(&task.cluster, &task.id, IDLE_STOP_REASON),
            )
            .await?;
        self.ctx.registry.release(&self.queue_url, &task.id);
        info!(queue = %self.queue_name, task_arn = %task.id, "Task stopped");
        Ok(())
    }
}

/// Blank-interval delay a monitor applies after an orchestrator error
pub fn orchestrator_cooldown(blank_poll: Duration) -> Duration {
    blank_poll.saturating_mul(ORCHESTRATOR_ERROR_COOLDOWN_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cancel::cancel_scope;
    use crate::config::{OverrideTemplate, PollIntervals, Settings};
    use crate::domain::{DesiredState, Tags};
    use crate::port::orchestrator::mocks::{LaunchBehavior, MockOrchestrator};
    use crate::port::queue_service::mocks::MockQueueService;
    use std::sync::Arc;

    const URL: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/orders.fifo";

    struct Harness {
        queues: Arc<MockQueueService>,
        orchestrator: Arc<MockOrchestrator>,
        ctx: ControllerContext,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_settings(test_settings())
        }

        fn with_settings(settings: Settings) -> Self {
            let queues = Arc::new(MockQueueService::new());
            queues.add_queue(URL, &[("env", "prod")]);
            let orchestrator = Arc::new(MockOrchestrator::new());
            let ctx = ControllerContext::new(queues.clone(), orchestrator.clone(), settings);
            Self {
                queues,
                orchestrator,
                ctx,
            }
        }

        fn monitor(&self) -> QueueMonitor {
            QueueMonitor::new(&Queue::new(URL, Tags::new()), self.ctx.clone())
        }
    }

    fn test_settings() -> Settings {
        let mut settings = Settings::new("cluster", "task-def:1");
        settings.intervals = PollIntervals {
            queue_refresh: Duration::from_secs(600),
            blank_poll: Duration::from_secs(30),
            active_poll: Duration::from_secs(300),
        };
        settings
    }

    #[tokio::test]
    async fn test_start_when_messages_waiting() {
        let h = Harness::new();
        h.queues.set_attributes(URL, 5, 0);
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Active);
        let requests = h.orchestrator.run_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].started_by, "MDS-orders.fifo");
        assert_eq!(requests[0].cluster, "cluster");
        assert_eq!(requests[0].task_definition, "task-def:1");
        assert_eq!(requests[0].launch_type, "EC2");
        assert!(requests[0].container_override.is_none());
        assert!(h.ctx.registry.contains(URL));
    }

    #[tokio::test]
    async fn test_stop_when_drained() {
        let h = Harness::new();
        h.queues.set_attributes(URL, 5, 0);
        let (_scope, mut token) = cancel_scope();
        let monitor = h.monitor();
        monitor.activate(&mut token).await.unwrap();
        let task = h.ctx.registry.get(URL).unwrap();

        h.queues.set_attributes(URL, 0, 0);
        let outcome = monitor.activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Blank);
        assert_eq!(h.orchestrator.stop_requests(), vec![task.id.clone()]);
        assert!(!h.ctx.registry.contains(URL));
        assert!(h.orchestrator.task(&task.id).unwrap().desired_state.is_stopped());
    }

    #[tokio::test]
    async fn test_confirm_keeps_running_task() {
        let h = Harness::new();
        let task = h
            .orchestrator
            .seed_task("cluster", Some("MDS-orders.fifo"), DesiredState::Running);
        h.ctx.registry.claim(URL, task.clone());
        h.queues.set_attributes(URL, 3, 1);
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Active);
        assert_eq!(h.orchestrator.describe_calls(), 1);
        assert!(h.orchestrator.run_requests().is_empty());
        assert_eq!(h.ctx.registry.get(URL).unwrap().id, task.id);
    }

    #[tokio::test]
    async fn test_stopped_task_replaced_in_same_activation() {
        let h = Harness::new();
        let stale = h
            .orchestrator
            .seed_task("cluster", Some("MDS-orders.fifo"), DesiredState::Stopped);
        h.ctx.registry.claim(URL, stale.clone());
        h.queues.set_attributes(URL, 2, 0);
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Active);
        assert_eq!(h.orchestrator.run_requests().len(), 1);
        let tracked = h.ctx.registry.get(URL).unwrap();
        assert_ne!(tracked.id, stale.id);
        assert_eq!(tracked.desired_state, DesiredState::Running);
    }

    #[tokio::test]
    async fn test_missing_task_replaced() {
        let h = Harness::new();
        let task = h
            .orchestrator
            .seed_task("cluster", Some("MDS-orders.fifo"), DesiredState::Running);
        h.ctx.registry.claim(URL, task.clone());
        h.orchestrator.evict_task(&task.id);
        h.queues.set_attributes(URL, 2, 0);
        let (_scope, mut token) = cancel_scope();

        h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(h.orchestrator.run_requests().len(), 1);
        assert_ne!(h.ctx.registry.get(URL).unwrap().id, task.id);
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_queue_untracked() {
        let h = Harness::new();
        h.queues.set_attributes(URL, 5, 0);
        h.orchestrator
            .set_launch_behavior(LaunchBehavior::Failure("RESOURCE:CPU".to_string()));
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Blank);
        assert_eq!(h.orchestrator.run_requests().len(), 1);
        assert!(h.ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_below_threshold_is_idle() {
        let mut settings = test_settings();
        settings.message_threshold = 10;
        let h = Harness::with_settings(settings);
        h.queues.set_attributes(URL, 9, 0);
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Blank);
        assert!(h.orchestrator.run_requests().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_messages_keep_task() {
        let h = Harness::new();
        let task = h
            .orchestrator
            .seed_task("cluster", Some("MDS-orders.fifo"), DesiredState::Running);
        h.ctx.registry.claim(URL, task);
        h.queues.set_attributes(URL, 0, 4);
        let (_scope, mut token) = cancel_scope();

        let outcome = h.monitor().activate(&mut token).await.unwrap();

        assert_eq!(outcome, Activation::Blank);
        assert!(h.orchestrator.stop_requests().is_empty());
        assert!(h.ctx.registry.contains(URL));
    }

    #[tokio::test]
    async fn test_override_uses_current_tags() {
        let mut settings = test_settings();
        settings.container_override = OverrideTemplate::from_raw(
            Some("worker"),
            Some("QUEUE_ENV=##MessageDelivery.Tag.env##:MISSING=##MessageDelivery.Tag.nope##"),
        )
        .unwrap();
        let h = Harness::with_settings(settings);
        h.queues.set_tag(URL, "env", "staging");
        h.queues.set_attributes(URL, 1, 0);
        let (_scope, mut token) = cancel_scope();

        h.monitor().activate(&mut token).await.unwrap();

        let requests = h.orchestrator.run_requests();
        let container_override = requests[0].container_override.as_ref().unwrap();
        assert_eq!(container_override.container_name, "worker");
        assert_eq!(
            container_override.environment,
            vec![
                ("QUEUE_ENV".to_string(), "staging".to_string()),
                ("MISSING".to_string(), "##MessageDelivery.Tag.nope##".to_string())
            ]
        );
        assert_eq!(h.queues.tag_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_interval_after_start() {
        let h = Harness::new();
        h.queues.set_attributes(URL, 5, 5);
        let (scope, token) = cancel_scope();
        let handle = tokio::spawn(h.monitor().run(token));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(h.queues.attribute_polls(), 1, "active queue must not use blank interval");

        tokio::time::sleep(Duration::from_secs(270)).await;
        assert_eq!(h.queues.attribute_polls(), 2);
        assert_eq!(h.orchestrator.run_requests().len(), 1);

        scope.cancel();
        assert_eq!(handle.await.unwrap(), MonitorExit::Cancelled);
    }

    #[test]
    fn test_cooldown_saturates_on_huge_blank_interval() {
        assert_eq!(orchestrator_cooldown(Duration::MAX), Duration::MAX);
        assert_eq!(
            orchestrator_cooldown(Duration::from_secs(30)),
            Duration::from_secs(150)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_error_cools_down_and_reschedules() {
        let h = Harness::new();
        h.queues.set_attributes(URL, 5, 0);
        h.orchestrator
            .set_launch_behavior(LaunchBehavior::Error("throttled".to_string()));
        let (scope, token) = cancel_scope();
        let handle = tokio::spawn(h.monitor().run(token));

        let cooldown = orchestrator_cooldown(Duration::from_secs(30));
        tokio::time::sleep(cooldown - Duration::from_secs(1)).await;
        assert_eq!(h.queues.attribute_polls(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.queues.attribute_polls(), 2);
        assert!(h.ctx.registry.is_empty());

        scope.cancel();
        assert_eq!(handle.await.unwrap(), MonitorExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_error_stops_monitoring() {
        let h = Harness::new();
        h.queues.set_failure(Some("connection reset"));
        let (_scope, token) = cancel_scope();

        let exit = h.monitor().run(token).await;

        assert_eq!(exit, MonitorExit::Abandoned);
        assert_eq!(h.queues.attribute_polls(), 1);

        // Nothing rescheduled
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(h.queues.attribute_polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_blank_wait() {
        let h = Harness::new();
        let (scope, token) = cancel_scope();
        let handle = tokio::spawn(h.monitor().run(token));

        tokio::time::sleep(Duration::from_secs(5)).await;
        scope.cancel();

        assert_eq!(handle.await.unwrap(), MonitorExit::Cancelled);
        assert_eq!(h.queues.attribute_polls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_scope_skips_poll() {
        let h = Harness::new();
        let (scope, mut token) = cancel_scope();
        scope.cancel();

        let err = h.monitor().activate(&mut token).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(h.queues.attribute_polls(), 0);
    }
}
