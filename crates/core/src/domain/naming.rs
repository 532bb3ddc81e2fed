// Deterministic task naming
//
// The same tag is the launch "started-by" marker and the key used to match
// running tasks back to queues after a restart.

/// Prefix carried by every task this controller launches
pub const TAG_PREFIX: &str = "MDS";

/// Orchestrator limit on the started-by marker
pub const MAX_TAG_LEN: usize = 32;

/// Started-by tag for a queue: `MDS-<short name>`, truncated to the orchestrator limit
pub fn deterministic_tag(queue_name: &str) -> String {
    format!("{}-{}", TAG_PREFIX, queue_name)
        .chars()
        .take(MAX_TAG_LEN)
        .collect()
}

/// Whether a started-by tag was produced by this controller
pub fn belongs_to_controller(started_by: &str) -> bool {
    started_by
        .get(..TAG_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(TAG_PREFIX))
}

/// Whether a candidate's tag identifies the queue owning `queue_tag`.
///
/// A shorter candidate still matches when it is a prefix of the queue tag.
pub fn tag_matches(queue_tag: &str, candidate: &str) -> bool {
    queue_tag.starts_with(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_format() {
        assert_eq!(deterministic_tag("orders.fifo"), "MDS-orders.fifo");
    }

    #[test]
    fn test_tag_is_deterministic() {
        let name = "payments-eu-west.fifo";
        assert_eq!(deterministic_tag(name), deterministic_tag(name));
    }

    #[test]
    fn test_tag_truncated_to_limit() {
        let name = "a".repeat(40);
        let tag = deterministic_tag(&name);
        assert_eq!(tag.len(), MAX_TAG_LEN);
        assert!(tag.starts_with("MDS-aaaa"));
    }

    #[test]
    fn test_produced_tags_belong_to_controller() {
        for name in ["orders.fifo", "", "x", &"long-queue-name".repeat(5)] {
            assert!(belongs_to_controller(&deterministic_tag(name)));
        }
    }

    #[test]
    fn test_ownership_is_case_insensitive() {
        assert!(belongs_to_controller("mds-orders.fifo"));
        assert!(belongs_to_controller("MdS"));
        assert!(!belongs_to_controller("ecs-svc/123"));
        assert!(!belongs_to_controller("MD"));
        assert!(!belongs_to_controller(""));
    }

    #[test]
    fn test_prefix_match_survives_truncation() {
        let queue_tag = deterministic_tag(&"b".repeat(40));
        assert!(tag_matches(&queue_tag, &queue_tag));
        assert!(tag_matches(&queue_tag, &queue_tag[..20]));
        assert!(!tag_matches(&queue_tag, "MDS-c"));
    }
}
