//! Push notifications from the host.

use serde::{Deserialize, Serialize};

use crate::host::FormId;

/// Notification kinds the monitor subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ContainerChanged,
    StageChanged,
    MenuToggled,
}

/// One notification, carrying only the fields its handler reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    /// Objects moved into `new_container`.
    ContainerChanged {
        new_container: FormId,
        base_object: FormId,
        count: u32,
    },
    /// A quest moved to a new stage.
    StageChanged { quest: FormId, stage: i32 },
    /// A UI menu opened or closed.
    MenuToggled { menu: String, opening: bool },
}

impl HostEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ContainerChanged { .. } => EventKind::ContainerChanged,
            Self::StageChanged { .. } => EventKind::StageChanged,
            Self::MenuToggled { .. } => EventKind::MenuToggled,
        }
    }
}
