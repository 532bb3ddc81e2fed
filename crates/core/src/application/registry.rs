// Shared Task Registry
//
// queue url -> task the controller believes is serving it. Shared by every
// queue monitor and the reconciliation loop; no entry reference is held
// across an await.

use crate::domain::{QueueUrl, Task};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent queue -> task map with first-writer-wins inserts
#[derive(Default)]
pub struct TaskRegistry {
    entries: DashMap<QueueUrl, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task tracked for a queue
    pub fn get(&self, queue_url: &str) -> Option<Task> {
        self.entries.get(queue_url).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, queue_url: &str) -> bool {
        self.entries.contains_key(queue_url)
    }

    /// Track `task` for a queue unless one is already tracked.
    ///
    /// Returns true if this call inserted the entry.
    pub fn claim(&self, queue_url: &str, task: Task) -> bool {
        match self.entries.entry(queue_url.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(task);
                true
            }
        }
    }

    /// Remove a queue's entry, but only while it still tracks `task_id`
    pub fn release(&self, queue_url: &str, task_id: &str) -> Option<Task> {
        self.entries
            .remove_if(queue_url, |_, task| task.id == task_id)
            .map(|(_, task)| task)
    }

    /// Remove whichever entry tracks `task_id`
    pub fn release_task(&self, task_id: &str) -> Option<QueueUrl> {
        let queue_url = self.queue_for_task(task_id)?;
        self.release(&queue_url, task_id).map(|_| queue_url)
    }

    /// Queue whose entry tracks `task_id`
    pub fn queue_for_task(&self, task_id: &str) -> Option<QueueUrl> {
        self.entries
            .iter()
            .find(|entry| entry.value().id == task_id)
            .map(|entry| entry.key().clone())
    }

    pub fn tracks_task(&self, task_id: &str) -> bool {
        self.queue_for_task(task_id).is_some()
    }

    /// Point-in-time copy of every entry
    pub fn snapshot(&self) -> Vec<(QueueUrl, Task)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
