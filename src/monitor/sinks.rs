//! Event sink adapters.
//!
//! Translates host notifications into progress-machine calls. Handlers run on
//! whatever thread the host delivers on, concurrently with the poller; they
//! only log and call into the machine, which serializes the actual transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::host::FormId;
use crate::journal::Channel;

use super::context::MonitorContext;
use super::events::HostEvent;

/// Event sinks bound to one monitor context.
#[derive(Debug)]
pub struct EventSinks {
    ctx: Arc<MonitorContext>,
    attached: AtomicBool,
}

impl EventSinks {
    /// Creates detached sinks; nothing is delivered until [`Self::attach`].
    #[must_use]
    pub fn new(ctx: Arc<MonitorContext>) -> Self {
        Self {
            ctx,
            attached: AtomicBool::new(false),
        }
    }

    /// Starts accepting notifications. Returns false if already attached.
    pub fn attach(&self) -> bool {
        !self.attached.swap(true, Ordering::Relaxed)
    }

    /// Stops accepting notifications. Returns false if already detached.
    pub fn detach(&self) -> bool {
        self.attached.swap(false, Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    /// Delivers one notification. Returns true if it advanced the pipeline.
    pub fn dispatch(&self, event: &HostEvent) -> bool {
        if !self.is_attached() {
            tracing::trace!(kind = ?event.kind(), "event ignored, sinks detached");
            return false;
        }
        match event {
            HostEvent::ContainerChanged {
                new_container,
                base_object,
                count,
            } => self.on_container_changed(*new_container, *base_object, *count),
            HostEvent::StageChanged { quest, stage } => self.on_stage_changed(*quest, *stage),
            HostEvent::MenuToggled { menu, opening } => {
                self.on_menu_toggled(menu, *opening);
                false
            }
        }
    }

    fn on_container_changed(&self, new_container: FormId, base_object: FormId, count: u32) -> bool {
        let ctx = &self.ctx;
        if !ctx.settings().item.enabled {
            return false;
        }
        let progress = ctx.progress();
        if !progress.trigger_reached || progress.item_detected || progress.completion_done {
            return false;
        }
        if ctx.inspector().player() != Some(new_container) {
            return false;
        }
        if ctx.resolved().item != Some(base_object) {
            return false;
        }

        ctx.journal().banner(
            Channel::Actions,
            [
                "CONTAINER CHANGE EVENT - ITEM ADDED TO PLAYER".to_string(),
                format!("Item FormID: {base_object}"),
                format!("Item Count: {count}"),
            ],
        );
        let now = ctx.clock().now();
        ctx.with_effects(|fx| ctx.machine().observe_item_presence(fx, true, now))
    }

    fn on_stage_changed(&self, quest: FormId, stage: i32) -> bool {
        let ctx = &self.ctx;
        let settings = ctx.settings();
        if !settings.quest.enabled || ctx.progress().completion_done {
            return false;
        }

        let key = &settings.quest.tracked_key;
        let tracked = ctx
            .resolved()
            .quest
            .or_else(|| ctx.inspector().find_progress_entity(key));
        if tracked != Some(quest) {
            return false;
        }

        ctx.journal().banner(
            Channel::Quest,
            [
                "QUEST STAGE EVENT RECEIVED".to_string(),
                format!("Quest: {key}"),
                format!("New Stage: {stage}"),
            ],
        );
        ctx.with_effects(|fx| ctx.machine().observe_progress(fx, stage, true))
    }

    fn on_menu_toggled(&self, menu: &str, opening: bool) {
        let verb = if opening { "opened" } else { "closed" };
        self.ctx.journal().info(Channel::Actions, format!("Menu {menu} {verb}"));
    }
}
