// Controller settings (loaded by the daemon, validated here)

use crate::domain::error::{DomainError, Result};
use crate::domain::{resolve, ContainerOverride, Tags};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use std::time::Duration;

/// Default queue tag key that excludes a queue from monitoring
pub const DEFAULT_SKIP_TAG: &str = "MessageDelivery.Skip";

/// Default orchestrator launch type
pub const DEFAULT_LAUNCH_TYPE: &str = "EC2";

// `'A=B:C'` keeps the colon inside one pair
static PAIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(.+?)'|[^:]+").expect("pair pattern is valid"));

// `A="B=C"` keeps the equals sign inside the value
static PART_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(.+?)"|[^=]+"#).expect("part pattern is valid"));

/// Poll and refresh intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// How long one reconciliation cycle keeps its monitors before rotating
    pub queue_refresh: Duration,
    /// Delay between activations while no task is tracked
    pub blank_poll: Duration,
    /// Delay between activations while a task is tracked
    pub active_poll: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            queue_refresh: Duration::from_secs(30 * 60),
            blank_poll: Duration::from_secs(30),
            active_poll: Duration::from_secs(5 * 60),
        }
    }
}

impl PollIntervals {
    pub fn from_units(refresh_minutes: u64, blank_seconds: u64, active_minutes: u64) -> Result<Self> {
        Ok(Self {
            queue_refresh: minutes(refresh_minutes, "queue refresh interval")?,
            blank_poll: Duration::from_secs(blank_seconds),
            active_poll: minutes(active_minutes, "active poll interval")?,
        })
    }
}

fn minutes(value: u64, name: &str) -> Result<Duration> {
    value
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            DomainError::ValidationError(format!("{} is out of range: {} minutes", name, value))
        })
}

/// Container environment override template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideTemplate {
    pub container_name: String,
    /// Ordered (key, template) pairs
    pub variables: Vec<(String, String)>,
}

impl OverrideTemplate {
    /// Build the template from the raw container name and `KEY=VALUE:KEY=VALUE` string.
    ///
    /// Returns `None` when no overrides are configured.
    pub fn from_raw(container_name: Option<&str>, raw: Option<&str>) -> Result<Option<Self>> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        let container_name = match container_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(DomainError::ValidationError(
                    "container name is required when environment overrides are set".to_string(),
                ))
            }
        };

        Ok(Some(Self {
            container_name,
            variables: parse_override_pairs(raw)?,
        }))
    }

    /// Resolve every value against the queue's current tags
    pub fn resolve(&self, tags: &Tags) -> ContainerOverride {
        ContainerOverride {
            container_name: self.container_name.clone(),
            environment: self
                .variables
                .iter()
                .map(|(key, template)| (key.clone(), resolve(template, tags)))
                .collect(),
        }
    }
}

fn unquoted<'h>(caps: &Captures<'h>) -> &'h str {
    match caps.get(1) {
        Some(inner) if !inner.as_str().is_empty() => inner.as_str(),
        _ => caps.get(0).map_or("", |whole| whole.as_str()),
    }
}

/// Parse `KEY=VALUE:OTHER=VALUE` into ordered pairs, rejecting duplicate keys
pub fn parse_override_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for caps in PAIR_PATTERN.captures_iter(raw) {
        let pair = unquoted(&caps);

        let parts: Vec<&str> = PART_PATTERN
            .captures_iter(pair)
            .map(|part| unquoted(&part))
            .collect();

        let (key, value) = match parts.as_slice() {
            [key, value] => (key.to_string(), value.to_string()),
            [_] | [] => {
                return Err(DomainError::InvalidOverrideTemplate(format!(
                    "`{}` is not a KEY=VALUE pair",
                    pair
                )))
            }
            _ => {
                return Err(DomainError::InvalidOverrideTemplate(format!(
                    "`{}` has more than one `=`; quote the value",
                    pair
                )))
            }
        };

        if pairs.iter().any(|(existing, _)| *existing == key) {
            return Err(DomainError::DuplicateOverride(key));
        }
        pairs.push((key, value));
    }

    if pairs.is_empty() {
        return Err(DomainError::InvalidOverrideTemplate(
            "no KEY=VALUE pairs found".to_string(),
        ));
    }
    Ok(pairs)
}

/// Validated controller settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub cluster: String,
    pub task_definition: String,
    pub launch_type: String,
    /// Minimum visible-message count that triggers a launch
    pub message_threshold: u64,
    /// Queue name prefix filter for discovery
    pub queue_prefix: String,
    /// Queues carrying this tag key are not monitored
    pub skip_tag: String,
    pub intervals: PollIntervals,
    pub container_override: Option<OverrideTemplate>,
}

impl Settings {
    /// Settings with defaults for every optional field
    pub fn new(cluster: impl Into<String>, task_definition: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            task_definition: task_definition.into(),
            launch_type: DEFAULT_LAUNCH_TYPE.to_string(),
            message_threshold: 1,
            queue_prefix: String::new(),
            skip_tag: DEFAULT_SKIP_TAG.to_string(),
            intervals: PollIntervals::default(),
            container_override: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster.trim().is_empty() {
            return Err(DomainError::ValidationError("cluster is required".to_string()));
        }
        if self.task_definition.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "task definition is required".to_string(),
            ));
        }
        // A zero threshold would make "drained" and "has work" overlap
        if self.message_threshold == 0 {
            return Err(DomainError::ValidationError(
                "message threshold must be at least 1".to_string(),
            ));
        }
        if self.intervals.blank_poll.is_zero()
            || self.intervals.active_poll.is_zero()
            || self.intervals.queue_refresh.is_zero()
        {
            return Err(DomainError::ValidationError(
                "poll and refresh intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
