// Queue Domain Model

use std::collections::HashMap;

/// Queue handle (URL as returned by the queue service)
pub type QueueUrl = String;

/// Queue tag set (key -> value)
pub type Tags = HashMap<String, String>;

/// Handles of ordered queues end with this suffix
pub const ORDERED_QUEUE_SUFFIX: &str = ".fifo";

/// Delivery ordering of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Ordered,
    Unordered,
}

impl QueueKind {
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(ORDERED_QUEUE_SUFFIX) {
            QueueKind::Ordered
        } else {
            QueueKind::Unordered
        }
    }
}

/// Queue snapshot for one discovery cycle
#[derive(Debug, Clone)]
pub struct Queue {
    pub url: QueueUrl,
    pub name: String,
    pub kind: QueueKind,
    pub tags: Tags,
}

impl Queue {
    pub fn new(url: impl Into<String>, tags: Tags) -> Self {
        let url = url.into();
        Self {
            name: short_name(&url).to_string(),
            kind: QueueKind::from_url(&url),
            url,
            tags,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.kind == QueueKind::Ordered
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }
}

/// Final path segment of a queue handle
pub fn short_name(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Per-poll message counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Messages available for retrieval
    pub visible: u64,
    /// Messages received but not yet deleted
    pub in_flight: u64,
}

impl QueueAttributes {
    pub fn new(visible: u64, in_flight: u64) -> Self {
        Self { visible, in_flight }
    }

    pub fn is_drained(&self) -> bool {
        self.visible == 0 && self.in_flight == 0
    }
}
