//! Runtime side of the monitor.
//!
//! Two observation paths feed the progress machine: the [`poller::Poller`]
//! thread and the push-driven [`sinks::EventSinks`]. Both run against one
//! shared [`context::MonitorContext`]. The [`lifecycle::LifecycleController`]
//! starts and stops them as the host moves between sessions.

/// Shared settings, state and host bindings.
pub mod context;
/// Host notification types.
pub mod events;
/// Session and shutdown orchestration.
pub mod lifecycle;
/// Background polling worker.
pub mod poller;
/// Notification handlers.
pub mod sinks;

pub use context::{MonitorContext, SessionId};
pub use events::{EventKind, HostEvent};
pub use lifecycle::{LifecycleController, LifecycleSignal, PRODUCT_NAME, VERSION};
pub use poller::{Poller, PAUSE_QUANTUM, WARM_UP};
pub use sinks::EventSinks;
