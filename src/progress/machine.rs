//! The progress pipeline.
//!
//! `Idle -> Active -> TriggerReached -> ItemDetected -> Completed`
//!
//! The poller and the event sinks both drive the same [`ProgressMachine`].
//! Every transition takes the machine lock for its whole duration and checks
//! its guard flag under that lock, so whichever path gets there first performs
//! the side effects and the other path's call does nothing.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::host::{Actions, FormId};
use crate::journal::{Channel, Journal};

use super::state::{ProgressSnapshot, ProgressState};

/// Wait between item detection and completion.
pub const COMPLETION_DEBOUNCE: Duration = Duration::from_secs(5);

/// Collaborators a transition may touch.
#[derive(Clone, Copy)]
pub struct Effects<'a> {
    pub settings: &'a Settings,
    pub journal: &'a Journal,
    pub actions: &'a dyn Actions,
    /// Resolved item handle, used for removal and logging.
    pub item: Option<FormId>,
}

impl std::fmt::Debug for Effects<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effects").field("item", &self.item).finish_non_exhaustive()
    }
}

/// Mutex-guarded progress pipeline for one session.
#[derive(Debug, Default)]
pub struct ProgressMachine {
    state: Mutex<ProgressState>,
}

impl ProgressMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds one observation of the tracked quest.
    ///
    /// Returns true if this call fired the trigger.
    pub fn observe_progress(&self, fx: &Effects<'_>, stage: i32, running: bool) -> bool {
        let mut state = self.lock();
        if state.completion_done {
            return false;
        }
        let quest = &fx.settings.quest;

        if !state.quest_active && running {
            state.quest_active = true;
            state.current_stage = stage;
            fx.journal.banner(
                Channel::Quest,
                [
                    "QUEST ACTIVATED".to_string(),
                    format!("Quest: {}", quest.tracked_key),
                    format!("Current Stage: {stage}"),
                    format!("Trigger Stage: {}", quest.trigger_stage),
                ],
            );
        }

        if state.quest_active && stage != state.current_stage {
            fx.journal.info(
                Channel::Quest,
                format!("Quest stage changed: {} -> {stage}", state.current_stage),
            );
            state.current_stage = stage;
        }

        let mut fired = false;
        if state.quest_active && !state.trigger_reached && stage >= quest.trigger_stage {
            fired = fire_trigger_locked(&mut state, fx);
        }

        // Reached milestones are kept; only the activity flag drops.
        if !running && state.quest_active {
            state.quest_active = false;
            fx.journal.info(
                Channel::Quest,
                format!("Quest is no longer running: {}", quest.tracked_key),
            );
        }

        fired
    }

    /// Records that the tracked quest could not be looked up.
    pub fn observe_missing(&self, fx: &Effects<'_>) {
        let mut state = self.lock();
        if state.quest_active {
            state.quest_active = false;
            fx.journal.warn(
                Channel::Quest,
                format!("Quest no longer accessible: {}", fx.settings.quest.tracked_key),
            );
        }
    }

    /// Marks the trigger stage as reached. Returns false if it already was.
    pub fn fire_trigger(&self, fx: &Effects<'_>) -> bool {
        fire_trigger_locked(&mut self.lock(), fx)
    }

    /// Feeds one observation of the item in the player's inventory.
    ///
    /// Returns true if this call detected the item.
    pub fn observe_item_presence(&self, fx: &Effects<'_>, present: bool, now: Instant) -> bool {
        let mut state = self.lock();
        if !state.trigger_reached || state.item_detected || state.completion_done {
            return false;
        }
        present && fire_item_detected_locked(&mut state, fx, now)
    }

    /// Marks the item as detected and starts the debounce at `now`.
    pub fn fire_item_detected(&self, fx: &Effects<'_>, now: Instant) -> bool {
        fire_item_detected_locked(&mut self.lock(), fx, now)
    }

    /// Completes the pipeline once the debounce has elapsed.
    ///
    /// Returns true if this call completed the quest.
    pub fn tick_delay(&self, fx: &Effects<'_>, now: Instant) -> bool {
        let mut state = self.lock();
        if !state.awaiting_completion_delay || !state.item_detected || state.completion_done {
            return false;
        }
        let Some(started) = state.delay_started_at else {
            return false;
        };
        if now.saturating_duration_since(started) < COMPLETION_DEBOUNCE {
            return false;
        }

        state.awaiting_completion_delay = false;
        fx.journal
            .banner(Channel::Actions, ["5 SECOND DELAY COMPLETE - PROCESSING QUEST"]);

        if fx.settings.item.remove_on_detection {
            match fx.item {
                Some(item) if fx.actions.remove_item(item, 1) => {
                    fx.journal
                        .info(Channel::Actions, "Item successfully removed from player inventory");
                }
                Some(_) => {
                    fx.journal
                        .warn(Channel::Actions, "Failed to remove item from player inventory");
                }
                None => {
                    fx.journal
                        .warn(Channel::Actions, "Item handle unresolved, removal skipped");
                }
            }
        }

        fire_completion_locked(&mut state, fx)
    }

    /// Advances the quest to its completion stage. Runs at most once per session.
    pub fn fire_completion(&self, fx: &Effects<'_>) -> bool {
        fire_completion_locked(&mut self.lock(), fx)
    }

    /// Returns every flag to its session-start value.
    pub fn reset(&self) {
        *self.lock() = ProgressState::default();
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot()
    }

    /// Full copy of the state, including the debounce start.
    #[must_use]
    pub fn state(&self) -> ProgressState {
        self.lock().clone()
    }
}

fn fire_trigger_locked(state: &mut ProgressState, fx: &Effects<'_>) -> bool {
    if state.trigger_reached {
        return false;
    }
    state.trigger_reached = true;

    let settings = fx.settings;
    fx.journal.banner(
        Channel::Quest,
        [
            "TRIGGER STAGE REACHED".to_string(),
            format!("Quest: {}", settings.quest.tracked_key),
            format!("Stage: {}", settings.quest.trigger_stage),
        ],
    );

    let messages = &settings.messages;
    if messages.enabled && messages.show_trigger_message && !state.trigger_message_shown {
        state.trigger_message_shown = true;
        fx.actions.show_message_box(&messages.trigger_message);
        fx.journal.info(Channel::Actions, "Trigger message displayed to player");
    }

    if settings.notification.enabled && settings.quest.show_notification {
        fx.actions.show_notification(&format!(
            "QuestFix - Quest stage {} reached",
            settings.quest.trigger_stage
        ));
    }

    fx.journal.info(
        Channel::Actions,
        format!("Now monitoring player inventory for: {}", settings.item.item_name),
    );
    true
}

fn fire_item_detected_locked(state: &mut ProgressState, fx: &Effects<'_>, now: Instant) -> bool {
    if state.item_detected || state.awaiting_completion_delay || state.completion_done {
        return false;
    }
    state.item_detected = true;
    state.awaiting_completion_delay = true;
    state.delay_started_at = Some(now);

    let item = &fx.settings.item;
    let handle = fx
        .item
        .map_or_else(|| "unresolved".to_string(), |id| id.to_string());
    fx.journal.banner(
        Channel::Actions,
        [
            "ITEM DETECTED IN PLAYER INVENTORY".to_string(),
            format!("Item: {}", item.item_name),
            format!("FormID: {handle}"),
            format!("Waiting {} seconds before processing...", COMPLETION_DEBOUNCE.as_secs()),
        ],
    );

    if item.show_notification && fx.settings.notification.enabled && !state.item_detected_message_shown {
        state.item_detected_message_shown = true;
        fx.actions.show_notification(&format!(
            "QuestFix: {} detected. The quest will advance shortly.",
            item.item_name
        ));
    }
    true
}

fn fire_completion_locked(state: &mut ProgressState, fx: &Effects<'_>) -> bool {
    if state.completion_done || !state.trigger_reached {
        return false;
    }

    let settings = fx.settings;
    let quest = &settings.quest;
    fx.journal.banner(
        Channel::Quest,
        [
            "PROCESSING QUEST COMPLETION".to_string(),
            format!("Quest: {}", quest.tracked_key),
            format!("Target Stage: {}", quest.completion_stage),
        ],
    );

    let advanced = fx.actions.advance_stage(&quest.tracked_key, quest.completion_stage);
    state.completion_done = true;
    state.awaiting_completion_delay = false;

    if advanced {
        fx.journal.info(Channel::Quest, "Stage advance accepted by host");
    } else {
        fx.journal.warn(Channel::Quest, "Host rejected the stage advance");
    }

    let messages = &settings.messages;
    if messages.enabled && messages.show_completion_message && !state.completion_message_shown {
        state.completion_message_shown = true;
        fx.actions.show_notification(&messages.completion_message);
        fx.journal.info(Channel::Actions, "Completion notification displayed to player");
    }

    fx.journal.banner(
        Channel::Actions,
        [
            "QUEST FIX COMPLETED SUCCESSFULLY".to_string(),
            format!("Quest: {}", quest.tracked_key),
            format!("Final Stage: {}", quest.completion_stage),
        ],
    );
    true
}
