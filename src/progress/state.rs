//! Session-scoped progress flags.

use std::time::Instant;

use serde::Serialize;

/// Pipeline position derived from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Active,
    TriggerReached,
    /// Item seen; waiting out the completion debounce.
    ItemDetected,
    Completed,
}

/// Everything the pipeline remembers within one session.
///
/// Only [`super::ProgressMachine`] mutates this, always under its lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub quest_active: bool,
    pub trigger_reached: bool,
    pub item_detected: bool,
    pub completion_done: bool,
    pub current_stage: i32,
    pub trigger_message_shown: bool,
    pub completion_message_shown: bool,
    pub item_detected_message_shown: bool,
    pub awaiting_completion_delay: bool,
    pub delay_started_at: Option<Instant>,
}

impl ProgressState {
    /// Furthest milestone reached. Later milestones win over `quest_active`,
    /// which may drop while the quest is stopped.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        if self.completion_done {
            Stage::Completed
        } else if self.item_detected {
            Stage::ItemDetected
        } else if self.trigger_reached {
            Stage::TriggerReached
        } else if self.quest_active {
            Stage::Active
        } else {
            Stage::Idle
        }
    }

    /// True when every field holds its session-start value.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            stage: self.stage(),
            quest_active: self.quest_active,
            trigger_reached: self.trigger_reached,
            item_detected: self.item_detected,
            completion_done: self.completion_done,
            current_stage: self.current_stage,
            trigger_message_shown: self.trigger_message_shown,
            completion_message_shown: self.completion_message_shown,
            item_detected_message_shown: self.item_detected_message_shown,
            awaiting_completion_delay: self.awaiting_completion_delay,
        }
    }
}

/// Serializable copy of [`ProgressState`] for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub stage: Stage,
    pub quest_active: bool,
    pub trigger_reached: bool,
    pub item_detected: bool,
    pub completion_done: bool,
    pub current_stage: i32,
    pub trigger_message_shown: bool,
    pub completion_message_shown: bool,
    pub item_detected_message_shown: bool,
    pub awaiting_completion_delay: bool,
}
