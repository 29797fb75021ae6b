//! Background poller.
//!
//! A single named worker thread that, after a warm-up, repeatedly polls the
//! quest and the player's inventory and advances the completion debounce.
//! Every sleep is a `select!` on the stop channel, so [`Poller::stop`] wakes
//! the worker immediately instead of waiting out the interval.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::error::{QuestFixError, QuestFixResult};
use crate::journal::Channel;

use super::context::MonitorContext;

/// Delay after a session starts before the first poll.
pub const WARM_UP: Duration = Duration::from_secs(5);

/// Sleep while paused or warming up, capped by the poll interval.
pub const PAUSE_QUANTUM: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "questfix-poller";

/// Lets a check through at most once per interval.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RateLimiter {
    last: Option<Instant>,
}

impl RateLimiter {
    pub(crate) fn ready(&mut self, now: Instant, interval: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Per-session loop state; rebuilt whenever the session epoch changes.
#[derive(Debug)]
struct SessionClock {
    epoch: u64,
    started: Instant,
    warmed_up: bool,
    quest_checks: RateLimiter,
    item_checks: RateLimiter,
}

impl SessionClock {
    fn new(epoch: u64, started: Instant) -> Self {
        Self {
            epoch,
            started,
            warmed_up: false,
            quest_checks: RateLimiter::default(),
            item_checks: RateLimiter::default(),
        }
    }
}

/// Handle to the running poller thread.
#[derive(Debug)]
pub struct Poller {
    stop_tx: Mutex<Option<Sender<()>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Resets the session and starts the worker.
    pub fn spawn(ctx: Arc<MonitorContext>) -> QuestFixResult<Self> {
        ctx.reset_cycles();
        ctx.reset_session();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker_ctx = Arc::clone(&ctx);
        let join = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || poll_loop(&worker_ctx, &stop_rx))
            .map_err(|e| QuestFixError::internal(format!("failed to spawn {THREAD_NAME}: {e}")))?;

        tracing::debug!(thread = THREAD_NAME, "poller spawned");
        Ok(Self {
            stop_tx: Mutex::new(Some(stop_tx)),
            join: Mutex::new(Some(join)),
        })
    }

    /// True until the worker has exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.join
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wakes the worker, waits for it to exit. Idempotent.
    pub fn stop(&self) {
        // Dropping the sender disconnects the channel and ends any sleep.
        drop(self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner).take());

        let handle = self.join.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(thread = THREAD_NAME, "poller panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleeps for `timeout`. Returns false if the stop channel fired instead.
fn sleep_or_stop(stop_rx: &Receiver<()>, timeout: Duration) -> bool {
    select! {
        recv(stop_rx) -> _ => false,
        default(timeout) => true,
    }
}

fn poll_loop(ctx: &MonitorContext, stop_rx: &Receiver<()>) {
    let mut session = SessionClock::new(ctx.session_epoch(), ctx.clock().now());
    let mut paused = false;

    let journal = ctx.journal();
    journal.info(
        Channel::System,
        "Monitoring thread started - Watching quest state and player inventory",
    );
    if let Some(roots) = journal.roots() {
        journal.info(Channel::System, format!("Primary: {}", roots.primary.display()));
        journal.info(Channel::System, format!("Secondary: {}", roots.secondary.display()));
    }
    journal.info(
        Channel::System,
        format!("Waiting {} seconds before starting quest monitoring", WARM_UP.as_secs()),
    );

    loop {
        if ctx.is_shutting_down() {
            break;
        }
        let settings = ctx.settings();
        if !settings.monitoring.enabled {
            journal.warn(Channel::System, "Monitoring disabled - poller exiting");
            break;
        }
        let interval = settings.monitoring.check_interval();
        let quantum = PAUSE_QUANTUM.min(interval);

        let epoch = ctx.session_epoch();
        if epoch != session.epoch {
            session = SessionClock::new(epoch, ctx.clock().now());
            journal.info(Channel::System, "New session - warm-up restarted");
        }

        if ctx.in_transition() {
            if !paused {
                paused = true;
                journal.info(Channel::System, "Game transition detected - monitoring paused");
            }
            if !sleep_or_stop(stop_rx, quantum) {
                break;
            }
            continue;
        }
        if paused {
            paused = false;
            journal.info(Channel::System, "Game transition ended - monitoring resumed");
        }

        let now = ctx.clock().now();
        if !session.warmed_up {
            if now.saturating_duration_since(session.started) < WARM_UP {
                if !sleep_or_stop(stop_rx, quantum) {
                    break;
                }
                continue;
            }
            session.warmed_up = true;
            journal.info(
                Channel::System,
                format!(
                    "{}-second initial delay complete, starting quest monitoring",
                    WARM_UP.as_secs()
                ),
            );
            ctx.resolve_identifiers();
        }

        ctx.record_cycle();
        if session.quest_checks.ready(now, interval) {
            ctx.poll_quest();
        }
        if session.item_checks.ready(now, interval) {
            ctx.poll_item(now);
        }
        ctx.tick(now);

        if !sleep_or_stop(stop_rx, interval) {
            break;
        }
    }

    journal.info(Channel::System, "Monitoring thread stopped");
}
