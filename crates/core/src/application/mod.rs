// Application Layer - Reconciliation and per-queue lifecycle

pub mod cancel;
pub mod constants;
pub mod context;
pub mod monitor;
pub mod reconciler;
pub mod registry;

// Re-exports
pub use cancel::{cancel_scope, CancelScope, CancelToken};
pub use context::ControllerContext;
pub use monitor::{Activation, MonitorExit, QueueMonitor};
pub use reconciler::{Cycle, Reconciler, Reconciliation};
pub use registry::TaskRegistry;
