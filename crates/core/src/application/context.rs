// Dependencies shared by the reconciliation loop and every queue monitor

use super::registry::TaskRegistry;
use crate::config::Settings;
use crate::port::{Orchestrator, QueueService};
use std::sync::Arc;

#[derive(Clone)]
pub struct ControllerContext {
    pub queues: Arc<dyn QueueService>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub registry: Arc<TaskRegistry>,
    pub settings: Arc<Settings>,
}

impl ControllerContext {
    /// Context with a fresh, empty registry
    pub fn new(
        queues: Arc<dyn QueueService>,
        orchestrator: Arc<dyn Orchestrator>,
        settings: Settings,
    ) -> Self {
        Self {
            queues,
            orchestrator,
            registry: Arc::new(TaskRegistry::new()),
            settings: Arc::new(settings),
        }
    }
}
