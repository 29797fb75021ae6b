//! Shared monitor context.
//!
//! One [`MonitorContext`] owns everything the poller, the event sinks and the
//! lifecycle controller share: settings, resolved identifiers, the progress
//! machine, the journal, the host bindings and the two signal flags. It is
//! built once and handed around as `Arc<MonitorContext>`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::host::{Actions, Inspector};
use crate::identifiers::{IdentifierResolver, ResolvedIdentifiers};
use crate::journal::{Channel, Journal};
use crate::progress::{Effects, ProgressMachine, ProgressSnapshot};
use crate::time::Clock;

/// Identifier of one game session (new game or loaded save).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// State shared by every monitor component.
pub struct MonitorContext {
    settings: RwLock<Arc<Settings>>,
    resolver: IdentifierResolver,
    machine: ProgressMachine,
    journal: Arc<Journal>,
    inspector: Arc<dyn Inspector>,
    actions: Arc<dyn Actions>,
    clock: Arc<dyn Clock>,
    shutdown: AtomicBool,
    transition: AtomicBool,
    session_epoch: AtomicU64,
    session_id: Mutex<SessionId>,
    cycles: AtomicU64,
}

impl fmt::Debug for MonitorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorContext")
            .field("resolved", &self.resolver.snapshot())
            .field("progress", &self.machine.snapshot())
            .field("shutdown", &self.is_shutting_down())
            .field("transition", &self.in_transition())
            .field("session_epoch", &self.session_epoch())
            .finish_non_exhaustive()
    }
}

impl MonitorContext {
    pub fn new(
        settings: Settings,
        journal: Arc<Journal>,
        inspector: Arc<dyn Inspector>,
        actions: Arc<dyn Actions>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            resolver: IdentifierResolver::new(),
            machine: ProgressMachine::new(),
            journal,
            inspector,
            actions,
            clock,
            shutdown: AtomicBool::new(false),
            transition: AtomicBool::new(false),
            session_epoch: AtomicU64::new(0),
            session_id: Mutex::new(SessionId::new()),
            cycles: AtomicU64::new(0),
        }
    }

    /// Current settings. Cheap; callers hold the `Arc` for one operation.
    #[must_use]
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swaps in a whole new settings value.
    pub fn replace_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    #[must_use]
    pub fn inspector(&self) -> &dyn Inspector {
        self.inspector.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    #[must_use]
    pub fn machine(&self) -> &ProgressMachine {
        &self.machine
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.machine.snapshot()
    }

    #[must_use]
    pub fn resolved(&self) -> ResolvedIdentifiers {
        self.resolver.snapshot()
    }

    /// Runs `f` with the collaborators a transition needs.
    pub(crate) fn with_effects<R>(&self, f: impl FnOnce(&Effects<'_>) -> R) -> R {
        let settings = self.settings();
        let fx = Effects {
            settings: &settings,
            journal: &self.journal,
            actions: self.actions.as_ref(),
            item: self.resolver.snapshot().item,
        };
        f(&fx)
    }

    /// Attempts every outstanding identifier lookup.
    pub fn resolve_identifiers(&self) -> ResolvedIdentifiers {
        let settings = self.settings();
        self.resolver.resolve(&settings, self.inspector(), &self.journal)
    }

    /// One poll of the tracked quest.
    pub fn poll_quest(&self) -> bool {
        let settings = self.settings();
        if !settings.quest.enabled || self.machine.snapshot().completion_done {
            return false;
        }

        let inspector = self.inspector();
        let handle = self
            .resolver
            .snapshot()
            .quest
            .or_else(|| inspector.find_progress_entity(&settings.quest.tracked_key));
        let observed = handle.and_then(|h| inspector.current_stage(h).map(|stage| (h, stage)));

        self.with_effects(|fx| match observed {
            Some((quest, stage)) => self.machine.observe_progress(fx, stage, inspector.is_running(quest)),
            None => {
                self.machine.observe_missing(fx);
                false
            }
        })
    }

    /// One poll of the player's inventory for the tracked item.
    pub fn poll_item(&self, now: Instant) -> bool {
        let settings = self.settings();
        if !settings.item.enabled {
            return false;
        }
        let progress = self.machine.snapshot();
        if !progress.trigger_reached || progress.item_detected || progress.completion_done {
            return false;
        }

        let resolved = match self.resolver.snapshot().item {
            Some(item) => Some(item),
            None => self.resolve_identifiers().item,
        };
        let Some(item) = resolved else {
            return false;
        };

        let present = self.inspector().player_has_item(item);
        self.with_effects(|fx| self.machine.observe_item_presence(fx, present, now))
    }

    /// Advances the completion debounce.
    pub fn tick(&self, now: Instant) -> bool {
        self.with_effects(|fx| self.machine.tick_delay(fx, now))
    }

    /// Starts a fresh session: progress and identifiers return to their
    /// initial values, the transition pause ends and running pollers restart
    /// their warm-up.
    pub fn reset_session(&self) -> SessionId {
        self.machine.reset();
        self.resolver.reset();
        self.transition.store(false, Ordering::Relaxed);
        self.session_epoch.fetch_add(1, Ordering::Relaxed);

        let id = SessionId::new();
        *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) = id;
        self.journal.info(Channel::System, format!("Session {id} started"));
        id
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        *self.session_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn session_epoch(&self) -> u64 {
        self.session_epoch.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn set_transition(&self, active: bool) {
        self.transition.store(active, Ordering::Relaxed);
    }

    #[must_use]
    pub fn in_transition(&self) -> bool {
        self.transition.load(Ordering::Relaxed)
    }

    /// Monitor cycles completed since the poller last started.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset_cycles(&self) {
        self.cycles.store(0, Ordering::Relaxed);
    }
}
