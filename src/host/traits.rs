//! Host contracts consumed by the monitor.
//!
//! These traits define what the monitor needs from the game. Implementations
//! are called from the poller thread and from event callbacks at the same
//! time, so they must be `Send + Sync`. None of the calls may block for long:
//! some of them run while the progress lock is held.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a host object (quest, item, actor or container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(pub u32);

impl FormId {
    /// Returns the raw identifier.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for FormId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Read-only view of host state.
pub trait Inspector: Send + Sync {
    /// Looks up a progress entity (quest) by its symbolic key.
    fn find_progress_entity(&self, key: &str) -> Option<FormId>;

    /// Current stage of a progress entity, or `None` if the handle is stale.
    fn current_stage(&self, quest: FormId) -> Option<i32>;

    /// Whether the progress entity is currently running.
    fn is_running(&self, quest: FormId) -> bool;

    /// Looks up an item by owning plugin and local identifier.
    fn find_item(&self, plugin_key: &str, local_id: u32) -> Option<FormId>;

    /// Whether the player holds at least one unit of `item`.
    fn player_has_item(&self, item: FormId) -> bool;

    /// Identity of the player's container, if the player exists yet.
    fn player(&self) -> Option<FormId>;

    /// Whether a content plugin is part of the current load order.
    fn is_plugin_loaded(&self, plugin_key: &str) -> bool;
}

/// Side effects the monitor may request from the host.
pub trait Actions: Send + Sync {
    /// Advances the progress entity `key` to `target_stage`. Returns false if
    /// the host rejected the command.
    fn advance_stage(&self, key: &str, target_stage: i32) -> bool;

    /// Removes `count` units of `item` from the player. Returns false on failure.
    fn remove_item(&self, item: FormId, count: u32) -> bool;

    /// Shows a short, non-blocking on-screen notification.
    fn show_notification(&self, text: &str);

    /// Shows a modal message box.
    fn show_message_box(&self, text: &str);
}
