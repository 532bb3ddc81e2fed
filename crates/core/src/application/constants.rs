// Controller constants (No magic values)
use std::time::Duration;

/// An orchestrator error makes a monitor wait this many blank intervals
pub const ORCHESTRATOR_ERROR_COOLDOWN_FACTOR: u32 = 5;

/// Delay after a failed reconciliation cycle, protects the APIs from hot-looping
pub const CYCLE_ERROR_COOLDOWN: Duration = Duration::from_secs(30);

/// Stop reason for a task whose queue has drained
pub const IDLE_STOP_REASON: &str = "Message count at 0";

/// Stop reason for a second task claiming the same queue
pub const DUPLICATE_STOP_REASON: &str = "Duplicate MessageDelivery task for queue";
