//! Lifecycle controller.
//!
//! Maps the host's load and session signals onto the monitor: attaching the
//! event sinks, validating settings, starting and stopping the poller, and
//! resetting session state.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::QuestFixResult;
use crate::host::{Actions, Inspector};
use crate::journal::{Channel, Journal, BANNER_RULE};
use crate::time::{self, Clock};

use super::context::MonitorContext;
use super::events::HostEvent;
use super::poller::Poller;
use super::sinks::EventSinks;

/// Product name written into the version banners.
pub const PRODUCT_NAME: &str = "QuestFix";

/// Crate version written into the version banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load and session signals delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// All game data is loaded; lookups become meaningful.
    DataReady,
    /// A new game was started.
    NewSession,
    /// A saved game finished loading.
    SessionLoaded,
    /// A save is about to be loaded; current state is about to become stale.
    PreUnload,
    /// Every plugin has been loaded.
    PostLoad,
    /// Input handling is ready.
    InputLoaded,
}

/// Owns the poller and the sinks for one monitor context.
#[derive(Debug)]
pub struct LifecycleController {
    ctx: Arc<MonitorContext>,
    sinks: EventSinks,
    poller: Mutex<Option<Poller>>,
    data_ready: AtomicBool,
}

impl LifecycleController {
    #[must_use]
    pub fn new(ctx: Arc<MonitorContext>) -> Self {
        let sinks = EventSinks::new(Arc::clone(&ctx));
        Self {
            ctx,
            sinks,
            poller: Mutex::new(None),
            data_ready: AtomicBool::new(false),
        }
    }

    /// Loads settings from `config_path`, opens the journal and runs
    /// [`Self::start`].
    ///
    /// A broken configuration file falls back to defaults with a warning.
    /// Failing to open any log directory is fatal.
    pub fn load(
        config_path: &Path,
        inspector: Arc<dyn Inspector>,
        actions: Arc<dyn Actions>,
        clock: Arc<dyn Clock>,
    ) -> QuestFixResult<Self> {
        let settings = match Settings::load_or_init(config_path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "configuration unusable, falling back to defaults");
                Settings::default()
            }
        };
        let journal = Arc::new(Journal::from_settings(&settings.logging)?);
        let ctx = Arc::new(MonitorContext::new(settings, journal, inspector, actions, clock));

        let controller = Self::new(ctx);
        controller.start();
        Ok(controller)
    }

    #[must_use]
    pub fn context(&self) -> &Arc<MonitorContext> {
        &self.ctx
    }

    #[must_use]
    pub fn sinks(&self) -> &EventSinks {
        &self.sinks
    }

    fn poller(&self) -> MutexGuard<'_, Option<Poller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while the poller thread is alive.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.poller().as_ref().is_some_and(Poller::is_running)
    }

    /// Plugin load: clears the previous run's journal files and writes the
    /// version banners and configuration summary.
    pub fn start(&self) {
        let journal = self.ctx.journal();
        journal.truncate_files();

        journal.info(Channel::System, format!("{PRODUCT_NAME} Plugin - v{VERSION}"));
        journal.info(Channel::Actions, format!("{PRODUCT_NAME} Actions Monitor - v{VERSION}"));
        journal.info(Channel::Quest, format!("{PRODUCT_NAME} Quest Monitor - v{VERSION}"));

        let settings = self.ctx.settings();
        let on_off = |enabled: bool| if enabled { "Enabled" } else { "Disabled" };
        journal.banner(
            Channel::System,
            [
                "PLUGIN CONFIGURATION LOADED".to_string(),
                format!("Quest Monitoring: {}", on_off(settings.quest.enabled)),
                format!("Quest Key: {}", settings.quest.tracked_key),
                format!("Quest Plugin: {}", settings.quest.tracked_plugin_key),
                format!("Trigger Stage: {}", settings.quest.trigger_stage),
                format!("Completion Stage: {}", settings.quest.completion_stage),
                format!("Item Monitoring: {}", on_off(settings.item.enabled)),
                format!("Item Key: {}", settings.item.item_key),
                format!("Item Plugin: {}", settings.item.item_plugin_key),
                format!("Item Name: {}", settings.item.item_name),
                format!("Check Interval: {} ms", settings.monitoring.check_interval().as_millis()),
            ],
        );
        tracing::info!(version = VERSION, "questfix loaded");
    }

    /// Reacts to one host signal.
    pub fn handle(&self, signal: LifecycleSignal) -> QuestFixResult<()> {
        tracing::debug!(?signal, "lifecycle signal");
        match signal {
            LifecycleSignal::DataReady => self.on_data_ready(),
            LifecycleSignal::NewSession | LifecycleSignal::SessionLoaded => self.on_session_start(),
            LifecycleSignal::PreUnload => {
                self.ctx
                    .journal()
                    .info(Channel::Actions, "Pre-load game detected - preparing for state reset");
                self.ctx.set_transition(true);
                Ok(())
            }
            LifecycleSignal::PostLoad => {
                self.ctx.journal().info(Channel::System, "Post-load message received");
                Ok(())
            }
            LifecycleSignal::InputLoaded => {
                self.ctx.journal().info(Channel::System, "Input loaded message received");
                Ok(())
            }
        }
    }

    /// Delivers a host notification to the sinks.
    pub fn dispatch(&self, event: &HostEvent) -> bool {
        self.sinks.dispatch(event)
    }

    fn on_data_ready(&self) -> QuestFixResult<()> {
        let journal = self.ctx.journal();
        if self.sinks.attach() {
            journal.info(Channel::System, "Container and Quest event sinks registered");
        }

        if !self.data_ready.swap(true, Ordering::Relaxed) {
            journal.info(
                Channel::System,
                format!("{PRODUCT_NAME} Plugin - v{VERSION} (DataReady)"),
            );
        }

        let mut settings = Settings::clone(&self.ctx.settings());
        let disabled = settings.validate_against(self.ctx.inspector());
        for feature in &disabled {
            journal.warn(
                Channel::Actions,
                format!("{} - Disabled [{}] in memory", feature.reason, feature.section),
            );
        }
        if !disabled.is_empty() {
            journal.info(
                Channel::Actions,
                "Validation completed - some features disabled in memory",
            );
            journal.info(
                Channel::Actions,
                "Configuration file preserved - NO modifications made",
            );
        }
        self.ctx.replace_settings(settings);

        self.ensure_poller()?;

        let settings = self.ctx.settings();
        journal.banner(
            Channel::System,
            [
                "DATA LOADED - Plugin fully initialized".to_string(),
                format!("Quest to monitor: {}", settings.quest.tracked_key),
                format!("Trigger stage: {}", settings.quest.trigger_stage),
                format!("Completion stage: {}", settings.quest.completion_stage),
                format!(
                    "Item to detect: {} ({})",
                    settings.item.item_name, settings.item.item_key
                ),
            ],
        );
        Ok(())
    }

    fn on_session_start(&self) -> QuestFixResult<()> {
        let journal = self.ctx.journal();
        journal.info(Channel::Actions, BANNER_RULE);
        journal.info(
            Channel::Actions,
            "SESSION START (New/Load) - Resetting Logic State safely",
        );

        if self.is_monitoring() {
            self.ctx.reset_session();
            journal.info(Channel::Actions, "Logic reset complete.");
            journal.info(Channel::Actions, "Monitoring thread logic: Already active, continuing.");
        } else {
            journal.info(Channel::Actions, "Monitoring thread logic: Starting...");
            if !self.ensure_poller()? {
                // Poller disabled by settings; the session still starts clean.
                self.ctx.reset_session();
            }
            journal.info(Channel::Actions, "Logic reset complete.");
        }

        journal.info(Channel::Actions, BANNER_RULE);
        Ok(())
    }

    /// Starts the poller unless it is running or monitoring is disabled.
    /// Returns true if a new poller was started.
    fn ensure_poller(&self) -> QuestFixResult<bool> {
        if self.ctx.is_shutting_down() {
            return Ok(false);
        }
        let journal = self.ctx.journal();
        if !self.ctx.settings().monitoring.enabled {
            journal.warn(Channel::System, "Monitoring disabled in configuration");
            return Ok(false);
        }

        let mut slot = self.poller();
        if slot.as_ref().is_some_and(Poller::is_running) {
            return Ok(false);
        }
        // Reap a worker that exited on its own before replacing it.
        if let Some(old) = slot.take() {
            old.stop();
        }
        *slot = Some(Poller::spawn(Arc::clone(&self.ctx))?);
        journal.info(Channel::System, "MONITORING SYSTEM ACTIVATED");
        Ok(true)
    }

    /// Stops everything and writes the shutdown banners. Idempotent.
    pub fn shutdown(&self) {
        if self.ctx.is_shutting_down() {
            return;
        }
        let journal = self.ctx.journal();
        for channel in [Channel::System, Channel::Actions, Channel::Quest] {
            journal.info(channel, "PLUGIN SHUTTING DOWN");
        }

        self.ctx.request_shutdown();

        if self.sinks.detach() {
            journal.info(Channel::System, "Event sinks unregistered");
        }

        let poller = self.poller().take();
        if let Some(poller) = poller {
            poller.stop();
            journal.info(Channel::System, "Monitoring thread stopped and joined");
        }

        let at = time::format_seconds(Local::now());
        for channel in [Channel::System, Channel::Quest, Channel::Actions] {
            journal.banner(channel, [format!("Plugin shutdown complete at: {at}")]);
        }
        tracing::info!("questfix shut down");
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;
    use crate::progress::Stage;
    use crate::time::ManualClock;

    fn controller(settings: Settings) -> (Arc<InMemoryHost>, LifecycleController) {
        let host = Arc::new(InMemoryHost::new());
        host.add_quest("YW_Quest_MDF", "YurianaWench.esp");
        host.add_item("YurianaWench.esp", 0x625C7C);
        let ctx = Arc::new(MonitorContext::new(
            settings,
            Arc::new(Journal::in_memory()),
            host.clone(),
            host.clone(),
            Arc::new(ManualClock::new()),
        ));
        (host, LifecycleController::new(ctx))
    }

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.monitoring.enabled = false;
        settings
    }

    #[test]
    fn test_start_writes_banners() {
        let (_, lc) = controller(quiet_settings());
        lc.start();
        let journal = lc.context().journal();
        assert!(journal.contains(Channel::System, "PLUGIN CONFIGURATION LOADED"));
        assert!(journal.contains(Channel::Actions, "Actions Monitor - v"));
        assert!(journal.contains(Channel::Quest, "Quest Monitor - v"));
    }

    #[test]
    fn test_data_ready_attaches_sinks_and_validates() {
        let (_, lc) = controller(quiet_settings());
        lc.handle(LifecycleSignal::DataReady).unwrap();

        assert!(lc.sinks().is_attached());
        assert!(lc.context().settings().quest.enabled);
        assert!(!lc.is_monitoring());
        assert!(lc.context().journal().contains(Channel::System, "DATA LOADED"));
    }

    #[test]
    fn test_data_ready_disables_missing_plugins_in_memory() {
        let mut settings = quiet_settings();
        settings.item.item_plugin_key = "Missing.esp".to_string();
        let (_, lc) = controller(settings);
        lc.handle(LifecycleSignal::DataReady).unwrap();

        let settings = lc.context().settings();
        assert!(settings.quest.enabled);
        assert!(!settings.item.enabled);
        assert!(lc
            .context()
            .journal()
            .contains(Channel::Actions, "Disabled [Item] in memory"));
    }

    #[test]
    fn test_pre_unload_pauses_and_session_start_resumes() {
        let (host, lc) = controller(quiet_settings());
        let ctx = Arc::clone(lc.context());
        host.set_quest("YW_Quest_MDF", 21, true);
        ctx.poll_quest();
        assert_eq!(ctx.progress().stage, Stage::TriggerReached);

        lc.handle(LifecycleSignal::PreUnload).unwrap();
        assert!(ctx.in_transition());

        lc.handle(LifecycleSignal::SessionLoaded).unwrap();
        assert!(!ctx.in_transition());
        assert!(ctx.machine().state().is_initial());
        assert!(ctx.journal().contains(Channel::Actions, "SESSION START"));
    }

    #[test]
    fn test_informational_signals_only_log() {
        let (_, lc) = controller(quiet_settings());
        lc.handle(LifecycleSignal::PostLoad).unwrap();
        lc.handle(LifecycleSignal::InputLoaded).unwrap();
        let journal = lc.context().journal();
        assert!(journal.contains(Channel::System, "Post-load message received"));
        assert!(journal.contains(Channel::System, "Input loaded message received"));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_, lc) = controller(quiet_settings());
        lc.handle(LifecycleSignal::DataReady).unwrap();
        lc.shutdown();
        lc.shutdown();

        let journal = lc.context().journal();
        let count = journal
            .lines(Channel::System)
            .iter()
            .filter(|l| l.contains("PLUGIN SHUTTING DOWN"))
            .count();
        assert_eq!(count, 1);
        assert!(!lc.sinks().is_attached());
        assert!(journal.contains(Channel::Quest, "Plugin shutdown complete at:"));
    }

    #[test]
    fn test_poller_starts_on_data_ready_and_stops_on_shutdown() {
        let mut settings = Settings::default();
        settings.monitoring.check_interval_ms = 5;
        let (_, lc) = controller(settings);

        lc.handle(LifecycleSignal::DataReady).unwrap();
        assert!(lc.is_monitoring());

        // A second data-ready does not start another worker.
        lc.handle(LifecycleSignal::DataReady).unwrap();
        let activations = lc
            .context()
            .journal()
            .lines(Channel::System)
            .iter()
            .filter(|l| l.ends_with("MONITORING SYSTEM ACTIVATED"))
            .count();
        assert_eq!(activations, 1);

        lc.shutdown();
        assert!(!lc.is_monitoring());
        assert!(lc
            .context()
            .journal()
            .contains(Channel::System, "Monitoring thread stopped and joined"));
    }
}
