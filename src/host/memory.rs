//! In-memory host.
//!
//! Thread-safe implementation of both host contracts backed by plain maps.
//! It is intended for tests, the simulator, and as a reference for real
//! bindings. Every action is recorded so callers can assert on exactly which
//! side effects the monitor produced.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::traits::{Actions, FormId, Inspector};

/// Form id the in-memory host uses for the player.
pub const PLAYER_FORM_ID: FormId = FormId(0x0000_0014);

/// A side effect recorded by [`InMemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum HostAction {
    AdvanceStage { key: String, stage: i32 },
    RemoveItem { item: FormId, count: u32 },
    Notification(String),
    MessageBox(String),
}

#[derive(Debug)]
struct QuestRecord {
    id: FormId,
    stage: i32,
    running: bool,
}

#[derive(Debug, Default)]
struct HostState {
    plugins: HashMap<String, u8>,
    quests: HashMap<String, QuestRecord>,
    items: HashMap<(String, u32), FormId>,
    inventory: HashMap<FormId, u32>,
    player_present: bool,
    next_local_quest_id: u32,
    reject_advances: bool,
    reject_removals: bool,
    actions: Vec<HostAction>,
}

/// In-memory game host.
#[derive(Debug)]
pub struct InMemoryHost {
    state: RwLock<HostState>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// Creates an empty host with a player and no plugins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HostState {
                player_present: true,
                next_local_quest_id: 0x800,
                ..HostState::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a plugin to the load order and returns its load index.
    pub fn load_plugin(&self, plugin_key: &str) -> u8 {
        let mut state = self.write();
        let next = u8::try_from(state.plugins.len() + 1).unwrap_or(u8::MAX);
        *state.plugins.entry(plugin_key.to_string()).or_insert(next)
    }

    /// Registers a quest owned by `plugin_key`, stopped at stage 0.
    pub fn add_quest(&self, key: &str, plugin_key: &str) -> FormId {
        let index = self.load_plugin(plugin_key);
        let mut state = self.write();
        if let Some(existing) = state.quests.get(key) {
            return existing.id;
        }
        let local = state.next_local_quest_id;
        state.next_local_quest_id += 1;
        let id = compose(index, local);
        state.quests.insert(
            key.to_string(),
            QuestRecord {
                id,
                stage: 0,
                running: false,
            },
        );
        id
    }

    /// Registers an item under `plugin_key` with the given local id.
    pub fn add_item(&self, plugin_key: &str, local_id: u32) -> FormId {
        let index = self.load_plugin(plugin_key);
        let id = compose(index, local_id);
        self.write().items.insert((plugin_key.to_string(), local_id), id);
        id
    }

    /// Sets a quest's stage and running flag.
    pub fn set_quest(&self, key: &str, stage: i32, running: bool) {
        if let Some(quest) = self.write().quests.get_mut(key) {
            quest.stage = stage;
            quest.running = running;
        }
    }

    /// Removes a quest so lookups by key fail.
    pub fn remove_quest(&self, key: &str) {
        self.write().quests.remove(key);
    }

    /// Returns a quest's current stage.
    #[must_use]
    pub fn quest_stage(&self, key: &str) -> Option<i32> {
        self.read().quests.get(key).map(|q| q.stage)
    }

    /// Adds `count` units of `item` to the player's inventory.
    pub fn give_item(&self, item: FormId, count: u32) {
        *self.write().inventory.entry(item).or_insert(0) += count;
    }

    /// Units of `item` the player currently holds.
    #[must_use]
    pub fn item_count(&self, item: FormId) -> u32 {
        self.read().inventory.get(&item).copied().unwrap_or(0)
    }

    /// Makes the player appear or disappear (e.g. during loading screens).
    pub fn set_player_present(&self, present: bool) {
        self.write().player_present = present;
    }

    /// Makes subsequent `advance_stage` calls fail.
    pub fn reject_advances(&self, reject: bool) {
        self.write().reject_advances = reject;
    }

    /// Makes subsequent `remove_item` calls fail.
    pub fn reject_removals(&self, reject: bool) {
        self.write().reject_removals = reject;
    }

    /// All recorded actions, oldest first.
    #[must_use]
    pub fn actions(&self) -> Vec<HostAction> {
        self.read().actions.clone()
    }

    /// Number of recorded actions matching `pred`.
    pub fn count_actions(&self, pred: impl Fn(&HostAction) -> bool) -> usize {
        self.read().actions.iter().filter(|a| pred(a)).count()
    }

    /// Number of `advance_stage` calls received, successful or not.
    #[must_use]
    pub fn advance_count(&self) -> usize {
        self.count_actions(|a| matches!(a, HostAction::AdvanceStage { .. }))
    }

    /// Number of message boxes shown.
    #[must_use]
    pub fn message_box_count(&self) -> usize {
        self.count_actions(|a| matches!(a, HostAction::MessageBox(_)))
    }

    /// Number of notifications whose text equals `text`.
    #[must_use]
    pub fn notifications_with(&self, text: &str) -> usize {
        self.count_actions(|a| matches!(a, HostAction::Notification(t) if t == text))
    }
}

fn compose(load_index: u8, local_id: u32) -> FormId {
    FormId((u32::from(load_index) << 24) | (local_id & 0x00FF_FFFF))
}

impl Inspector for InMemoryHost {
    fn find_progress_entity(&self, key: &str) -> Option<FormId> {
        self.read().quests.get(key).map(|q| q.id)
    }

    fn current_stage(&self, quest: FormId) -> Option<i32> {
        self.read().quests.values().find(|q| q.id == quest).map(|q| q.stage)
    }

    fn is_running(&self, quest: FormId) -> bool {
        self.read()
            .quests
            .values()
            .find(|q| q.id == quest)
            .is_some_and(|q| q.running)
    }

    fn find_item(&self, plugin_key: &str, local_id: u32) -> Option<FormId> {
        self.read()
            .items
            .get(&(plugin_key.to_string(), local_id & 0x00FF_FFFF))
            .copied()
    }

    fn player_has_item(&self, item: FormId) -> bool {
        let state = self.read();
        state.player_present && state.inventory.get(&item).is_some_and(|&n| n > 0)
    }

    fn player(&self) -> Option<FormId> {
        self.read().player_present.then_some(PLAYER_FORM_ID)
    }

    fn is_plugin_loaded(&self, plugin_key: &str) -> bool {
        self.read().plugins.contains_key(plugin_key)
    }
}

impl Actions for InMemoryHost {
    fn advance_stage(&self, key: &str, target_stage: i32) -> bool {
        let mut state = self.write();
        state.actions.push(HostAction::AdvanceStage {
            key: key.to_string(),
            stage: target_stage,
        });
        if state.reject_advances {
            return false;
        }
        match state.quests.get_mut(key) {
            Some(quest) => {
                quest.stage = target_stage;
                true
            }
            None => false,
        }
    }

    fn remove_item(&self, item: FormId, count: u32) -> bool {
        let mut state = self.write();
        state.actions.push(HostAction::RemoveItem { item, count });
        if state.reject_removals {
            return false;
        }
        match state.inventory.get_mut(&item) {
            Some(held) if *held >= count => {
                *held -= count;
                true
            }
            _ => false,
        }
    }

    fn show_notification(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.write().actions.push(HostAction::Notification(text.to_string()));
    }

    fn show_message_box(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.write().actions.push(HostAction::MessageBox(text.to_string()));
    }
}
