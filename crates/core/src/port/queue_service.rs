// Queue Service Port (Interface)

use crate::domain::{QueueAttributes, QueueUrl, Tags};
use async_trait::async_trait;
use thiserror::Error;

/// Most queue handles one listing returns
pub const LIST_QUEUES_LIMIT: usize = 1000;

/// Queue service errors
#[derive(Error, Debug)]
pub enum QueueServiceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Read-only view of the message queue service
#[async_trait]
pub trait QueueService: Send + Sync {
    /// List queue handles whose name starts with `prefix` (bounded to `LIST_QUEUES_LIMIT`)
    async fn list_queues(&self, prefix: &str) -> Result<Vec<QueueUrl>, QueueServiceError>;

    /// Visible and in-flight message counts
    async fn get_attributes(&self, queue_url: &str)
        -> Result<QueueAttributes, QueueServiceError>;

    /// Current tag set of a queue
    async fn list_tags(&self, queue_url: &str) -> Result<Tags, QueueServiceError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::queue::short_name;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory queue service
    #[derive(Default)]
    pub struct MockQueueService {
        queues: Mutex<Vec<QueueUrl>>,
        attributes: Mutex<HashMap<QueueUrl, QueueAttributes>>,
        tags: Mutex<HashMap<QueueUrl, Tags>>,
        failure: Mutex<Option<String>>,
        attribute_polls: Mutex<usize>,
        tag_fetches: Mutex<usize>,
        tag_failures: Mutex<HashSet<QueueUrl>>,
    }
    impl MockQueueService {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn add_queue(&self, url: impl Into<String>, tags: &[(&str, &str)]) {
            let url = url.into();
            let tags = tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.tags.lock().unwrap().insert(url.clone(), tags);
            self.queues.lock().unwrap().push(url);
        }
        pub fn set_attributes(&self, url: &str, visible: u64, in_flight: u64) {
            self.attributes
                .lock()
                .unwrap()
                .insert(url.to_string(), QueueAttributes::new(visible, in_flight));
        }
        pub fn set_tag(&self, url: &str, key: &str, value: &str) {
            self.tags
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        /// Make every call fail (None restores normal behavior)
        pub fn set_failure(&self, message: Option<&str>) {
            *self.failure.lock().unwrap() = message.map(str::to_string);
        }
        /// Make `list_tags` fail for one queue only (as if it was deleted after listing)
        pub fn fail_tags_for(&self, url: &str) {
            self.tag_failures.lock().unwrap().insert(url.to_string());
        }
        pub fn attribute_polls(&self) -> usize {
            *self.attribute_polls.lock().unwrap()
        }
        pub fn tag_fetches(&self) -> usize {
            *self.tag_fetches.lock().unwrap()
        }
        fn check(&self) -> Result<(), QueueServiceError> {
            match self.failure.lock().unwrap().as_ref() {
                Some(message) => Err(QueueServiceError::Request(message.clone())),
                None => Ok(()),
            }
        }
    }
    #[async_trait]
    impl QueueService for MockQueueService {
        async fn list_queues(&self, prefix: &str) -> Result<Vec<QueueUrl>, QueueServiceError> {
            self.check()?;
            Ok(self
                .queues
                .lock()
                .unwrap()
                .iter()
                .filter(|url| short_name(url).starts_with(prefix))
                .take(LIST_QUEUES_LIMIT)
                .cloned()
                .collect())
        }
        async fn get_attributes(
            &self,
            queue_url: &str,
        ) -> Result<QueueAttributes, QueueServiceError> {
            *self.attribute_polls.lock().unwrap() += 1;
            self.check()?;
            Ok(self
                .attributes
                .lock()
                .unwrap()
                .get(queue_url)
                .copied()
                .unwrap_or_default())
        }
        async fn list_tags(&self, queue_url: &str) -> Result<Tags, QueueServiceError> {
            *self.tag_fetches.lock().unwrap() += 1;
            self.check()?;
            if self.tag_failures.lock().unwrap().contains(queue_url) {
                return Err(QueueServiceError::Request(
                    "QueueDoesNotExist: the specified queue does not exist".to_string(),
                ));
            }
            Ok(self
                .tags
                .lock()
                .unwrap()
                .get(queue_url)
                .cloned()
                .unwrap_or_default())
        }
    }
}
