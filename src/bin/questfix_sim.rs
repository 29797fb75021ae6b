//! Scripted run of the full monitor against the in-memory host.
//!
//! Walks one session through activation, the trigger stage and the item
//! entering the player's inventory, then prints the final state as JSON.
//! Time runs on a manual clock so warm-up and debounce take milliseconds.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use serde_json::json;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use questfix::host::{InMemoryHost, PLAYER_FORM_ID};
use questfix::identifiers::parse_item_key;
use questfix::monitor::{HostEvent, LifecycleController, LifecycleSignal, MonitorContext};
use questfix::time::{Clock, ManualClock};
use questfix::{Journal, QuestFixError, QuestFixResult, Settings, Stage};

#[derive(Debug, Parser)]
#[command(name = "questfix-sim", version, about = "Simulate one quest session against an in-memory host")]
struct Args {
    /// Configuration file; written with defaults if missing.
    #[arg(long, default_value = "questfix.toml")]
    config: PathBuf,

    /// Write journal files under this directory instead of the configured roots.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Poll interval override in milliseconds.
    #[arg(long, default_value_t = 20)]
    interval_ms: u64,

    /// Deliver the trigger stage as a stage-change event instead of waiting for a poll.
    #[arg(long)]
    stage_event: bool,

    /// Make the host refuse to remove the item.
    #[arg(long)]
    reject_removal: bool,

    /// Give up after this many wall-clock seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("questfix-sim: session did not complete within {}s", args.timeout_secs);
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("questfix-sim: {err}");
            ExitCode::from(2)
        }
    }
}

/// Simulated time that passes per real poll interval.
const SIMULATED_STEP: Duration = Duration::from_millis(250);

/// Advances the manual clock once per real poll interval until `done` holds
/// or the deadline passes.
struct Driver<'a> {
    ctx: &'a MonitorContext,
    clock: &'a ManualClock,
    clock_step: Duration,
    real_step: Duration,
    deadline: Instant,
}

impl Driver<'_> {
    fn until(&self, done: impl Fn(&MonitorContext) -> bool) -> bool {
        while Instant::now() < self.deadline {
            if done(self.ctx) {
                return true;
            }
            self.clock.advance(self.clock_step);
            thread::sleep(self.real_step);
        }
        done(self.ctx)
    }
}

fn run(args: &Args) -> QuestFixResult<bool> {
    let mut settings = Settings::load_or_init(&args.config)?;
    settings.monitoring.check_interval_ms = args.interval_ms;
    if let Some(dir) = &args.log_dir {
        settings.logging.primary_dir = Some(dir.join("primary"));
        settings.logging.secondary_dir = Some(dir.join("secondary"));
    }

    let journal = Journal::from_settings(&settings.logging)?;

    let host = Arc::new(InMemoryHost::new());
    host.add_quest(&settings.quest.tracked_key, &settings.quest.tracked_plugin_key);
    let local_id = parse_item_key(&settings.item.item_key)
        .map_err(|e| QuestFixError::internal(format!("invalid item key {:?}: {e}", settings.item.item_key)))?;
    let item = host.add_item(&settings.item.item_plugin_key, local_id);
    host.reject_removals(args.reject_removal);

    let quest_key = settings.quest.tracked_key.clone();
    let trigger_stage = settings.quest.trigger_stage;
    let step = settings.monitoring.check_interval();

    let clock = Arc::new(ManualClock::new());
    let ctx = Arc::new(MonitorContext::new(
        settings,
        Arc::new(journal),
        host.clone(),
        host.clone(),
        clock.clone(),
    ));
    let started = clock.now();
    let controller = LifecycleController::new(Arc::clone(&ctx));
    controller.start();
    controller.handle(LifecycleSignal::PostLoad)?;
    controller.handle(LifecycleSignal::DataReady)?;
    controller.handle(LifecycleSignal::NewSession)?;

    let driver = Driver {
        ctx: &ctx,
        clock: &clock,
        clock_step: SIMULATED_STEP.max(step),
        real_step: step,
        deadline: Instant::now() + Duration::from_secs(args.timeout_secs),
    };

    host.set_quest(&quest_key, trigger_stage.saturating_sub(1).max(0), true);
    let mut completed = driver.until(|ctx| ctx.progress().quest_active);

    if completed {
        host.set_quest(&quest_key, trigger_stage, true);
        if args.stage_event {
            let quest = ctx.inspector().find_progress_entity(&quest_key);
            if let Some(quest) = quest {
                controller.dispatch(&HostEvent::StageChanged {
                    quest,
                    stage: trigger_stage,
                });
            }
        }
        completed = driver.until(|ctx| ctx.progress().trigger_reached);
    }

    if completed {
        host.give_item(item, 1);
        controller.dispatch(&HostEvent::ContainerChanged {
            new_container: PLAYER_FORM_ID,
            base_object: item,
            count: 1,
        });
        completed = driver.until(|ctx| ctx.progress().stage == Stage::Completed);
    }

    controller.shutdown();

    let report = json!({
        "session": ctx.session_id(),
        "cycles": ctx.cycles(),
        "resolved": ctx.resolved(),
        "progress": ctx.progress(),
        "quest_stage": host.quest_stage(&quest_key),
        "item_count": host.item_count(item),
        "actions": host.actions(),
        "simulated_ms": clock.now().saturating_duration_since(started).as_millis(),
    });
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| QuestFixError::internal(format!("failed to render report: {e}")))?;
    println!("{rendered}");

    Ok(completed)
}
