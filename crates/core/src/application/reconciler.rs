// Reconciliation Loop
//
// Each cycle rebuilds the registry from the cluster (which is also how state is
// recovered after a restart), spawns one monitor per ordered queue under a
// fresh cancellation scope, waits for the refresh interval and rotates.

use super::cancel::{cancel_scope, CancelScope, CancelToken};
use super::constants::{CYCLE_ERROR_COOLDOWN, DUPLICATE_STOP_REASON};
use super::context::ControllerContext;
use super::monitor::{MonitorExit, QueueMonitor};
use crate::domain::naming::tag_matches;
use crate::domain::{belongs_to_controller, deterministic_tag, Queue, QueueKind, QueueUrl, Task};
use crate::error::Result;
use crate::port::orchestrator::DESCRIBE_BATCH_LIMIT;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Outcome of the scan/discover/reclaim steps of one cycle
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Ordered, non-skipped queues to monitor this cycle
    pub queues: Vec<Queue>,
    /// Ordered queues carrying the skip tag
    pub skipped: Vec<QueueUrl>,
    /// Running tasks moved into the registry
    pub reclaimed: usize,
    /// Duplicate tasks a stop was issued for
    pub duplicates_stopped: usize,
    /// Controller tasks that match no discovered queue
    pub unmatched: Vec<Task>,
}

/// Monitors spawned by one cycle
pub struct Cycle {
    scope: CancelScope,
    monitors: JoinSet<MonitorExit>,
}

impl Cycle {
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Cancel the scope and wait for every monitor of this cycle to exit
    pub async fn rotate(mut self) {
        self.scope.cancel();
        while let Some(joined) = self.monitors.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Queue monitor task failed");
            }
        }
    }
}

/// Candidate controller tasks keyed by started-by tag
struct ClusterScan {
    candidates: HashMap<String, Task>,
    duplicates_stopped: usize,
}

pub struct Reconciler {
    ctx: ControllerContext,
}

impl Reconciler {
    pub fn new(ctx: ControllerContext) -> Self {
        Self { ctx }
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// A failed cycle is logged and followed by `CYCLE_ERROR_COOLDOWN`; it never
    /// ends the loop.
    pub async fn run(&self, mut shutdown: CancelToken) {
        let settings = &self.ctx.settings;
        info!(
            cluster = %settings.cluster,
            queue_prefix = %settings.queue_prefix,
            refresh_secs = settings.intervals.queue_refresh.as_secs(),
            "Reconciliation loop started"
        );

        while !shutdown.is_cancelled() {
            match self.start_cycle().await {
                Ok(cycle) => {
                    info!(
                        monitors = cycle.monitor_count(),
                        "All queues are being monitored, waiting for next queue refresh"
                    );
                    let completed = shutdown.sleep(settings.intervals.queue_refresh).await;
                    cycle.rotate().await;
                    if !completed {
                        break;
                    }
                    info!("Refreshing queues");
                }
                Err(e) => {
                    error!(
                        error = %e,
                        cooldown_secs = CYCLE_ERROR_COOLDOWN.as_secs(),
                        "Reconciliation cycle failed"
                    );
                    if !shutdown.sleep(CYCLE_ERROR_COOLDOWN).await {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation loop stopped");
    }

    /// Reconcile, then spawn a monitor per queue under a fresh scope
    pub async fn start_cycle(&self) -> Result<Cycle> {
        let reconciliation = self.reconcile().await?;
        let (scope, _token) = cancel_scope();
        let mut monitors = JoinSet::new();

        for queue in &reconciliation.queues {
            let monitor = QueueMonitor::new(queue, self.ctx.clone());
            monitors.spawn(monitor.run(scope.token()));
        }

        Ok(Cycle { scope, monitors })
    }

    /// Scan the cluster, discover queues, reclaim running tasks, apply the skip tag
    pub async fn reconcile(&self) -> Result<Reconciliation> {
        let scan = self.scan_cluster().await?;
        let mut candidates = scan.candidates;
        let queues = self.discover_queues().await?;
        let reclaimed = self.reclaim(&queues, &mut candidates);

        let unmatched: Vec<Task> = candidates.into_values().collect();
        for task in &unmatched {
            warn!(
                task_arn = %task.id,
                started_by = task.started_by.as_deref().unwrap_or_default(),
                "Running task does not match any discovered queue"
            );
        }

        let skip_tag = &self.ctx.settings.skip_tag;
        let (skipped, monitored): (Vec<Queue>, Vec<Queue>) =
            queues.into_iter().partition(|queue| queue.has_tag(skip_tag));
        for queue in &skipped {
            info!(queue = %queue.name, skip_tag = %skip_tag, "Queue carries the skip tag, not monitoring");
        }

        Ok(Reconciliation {
            queues: monitored,
            skipped: skipped.into_iter().map(|queue| queue.url).collect(),
            reclaimed,
            duplicates_stopped: scan.duplicates_stopped,
            unmatched,
        })
    }

    /// List, describe and deduplicate every live controller task in the cluster
    async fn scan_cluster(&self) -> Result<ClusterScan> {
        let cluster = &self.ctx.settings.cluster;
        let task_ids = self.list_task_ids(cluster).await?;
        debug!(cluster = %cluster, tasks = task_ids.len(), "Listed cluster tasks");

        let mut live = Vec::new();
        for batch in task_ids.chunks(DESCRIBE_BATCH_LIMIT) {
            let described = self.ctx.orchestrator.describe_tasks(cluster, batch).await?;
            for failure in &described.failures {
                warn!(failure = %failure, "Describe reported a failure during cluster scan");
            }
            live.extend(
                described
                    .tasks
                    .into_iter()
                    .filter(|task| !task.desired_state.is_stopped()),
            );
        }

        self.repair_registry(&live).await?;

        let mut candidates: HashMap<String, Task> = HashMap::new();
        let mut duplicates_stopped = 0;
        for task in live {
            let Some(tag) = task.started_by.clone().filter(|tag| belongs_to_controller(tag))
            else {
                continue;
            };

            match candidates.entry(tag) {
                Entry::Vacant(vacant) => {
                    vacant.insert(task);
                }
                Entry::Occupied(mut kept) => {
                    // The task the registry already tracks is the one that survives
                    let extra = if self.ctx.registry.tracks_task(&task.id) {
                        kept.insert(task)
                    } else {
                        task
                    };
                    warn!(
                        started_by = %kept.key(),
                        task_arn = %extra.id,
                        kept_arn = %kept.get().id,
                        "Probable duplicate task, stopping it"
                    );
                    match self
                        .ctx
                        .orchestrator
                        .stop_task(&extra.cluster, &extra.id, DUPLICATE_STOP_REASON)
                        .await
                    {
                        Ok(_) => {
                            self.ctx.registry.release_task(&extra.id);
                            duplicates_stopped += 1;
                        }
                        Err(e) => {
                            error!(task_arn = %extra.id, error = %e, "Failed to stop duplicate task");
                        }
                    }
                }
            }
        }

        Ok(ClusterScan {
            candidates,
            duplicates_stopped,
        })
    }

    async fn list_task_ids(&self, cluster: &str) -> Result<Vec<String>> {
        let mut task_ids = Vec::new();
        let mut page_token = None;
        loop {
            let page = self.ctx.orchestrator.list_tasks(cluster, page_token).await?;
            task_ids.extend(page.task_ids);
            match page.next_token {
                Some(token) => page_token = Some(token),
                None => return Ok(task_ids),
            }
        }
    }

    /// Forget registry entries whose task has stopped or disappeared
    async fn repair_registry(&self, live: &[Task]) -> Result<()> {
        let live_ids: HashSet<&str> = live.iter().map(|task| task.id.as_str()).collect();
        let unseen: Vec<(QueueUrl, Task)> = self
            .ctx
            .registry
            .snapshot()
            .into_iter()
            .filter(|(_, task)| !live_ids.contains(task.id.as_str()))
            .collect();

        for (queue_url, task) in unseen {
            // May have been launched after the listing; only drop confirmed stops
            let described = self
                .ctx
                .orchestrator
                .describe_tasks(&task.cluster, std::slice::from_ref(&task.id))
                .await?;
            if described.is_gone(&task.id) {
                self.ctx.registry.release(&queue_url, &task.id);
                info!(
                    queue = %queue_url,
                    task_arn = %task.id,
                    "Removed stopped task from registry"
                );
            }
        }
        Ok(())
    }

    /// Ordered queues under the configured prefix, with their current tags
    async fn discover_queues(&self) -> Result<Vec<Queue>> {
        info!("Getting list of queues");
        let urls = self
            .ctx
            .queues
            .list_queues(&self.ctx.settings.queue_prefix)
            .await?;
        let total = urls.len();

        let mut queues = Vec::new();
        for url in urls
            .into_iter()
            .filter(|url| QueueKind::from_url(url) == QueueKind::Ordered)
        {
            // One unreadable queue only drops that queue from this cycle
            match self.ctx.queues.list_tags(&url).await {
                Ok(tags) => queues.push(Queue::new(url, tags)),
                Err(e) => {
                    error!(queue = %url, error = %e, "Failed to read queue tags, skipping queue this cycle");
                }
            }
        }

        info!(
            total,
            ordered = queues.len(),
            "Discovered queues (only ordered queues are monitored)"
        );
        Ok(queues)
    }

    /// Move matching candidates into the registry (first writer wins)
    fn reclaim(&self, queues: &[Queue], candidates: &mut HashMap<String, Task>) -> usize {
        let mut reclaimed = 0;
        for queue in queues {
            let queue_tag = deterministic_tag(&queue.name);
            let key = if candidates.contains_key(&queue_tag) {
                Some(queue_tag.clone())
            } else {
                candidates
                    .keys()
                    .find(|candidate| tag_matches(&queue_tag, candidate))
                    .cloned()
            };
            let Some(task) = key.and_then(|key| candidates.remove(&key)) else {
                continue;
            };

            if self.ctx.registry.claim(&queue.url, task.clone()) {
                info!(queue = %queue.name, task_arn = %task.id, "Reclaimed running task");
                reclaimed += 1;
            } else {
                debug!(queue = %queue.name, task_arn = %task.id, "Queue already tracked");
            }
        }
        reclaimed
    }
}
