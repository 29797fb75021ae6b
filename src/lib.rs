//! # QuestFix - quest progress monitor
//!
//! QuestFix watches one tracked quest and one tracked item inside a game host
//! and, once the quest reaches its trigger stage and the player obtains the
//! item, advances the quest to its completion stage exactly once.
//!
//! ## Core Concepts
//!
//! - **Progress machine**: `Idle -> Active -> TriggerReached -> ItemDetected -> Completed`,
//!   driven by both a poller thread and host event sinks
//! - **Identifier resolver**: lazily turns configured keys into host handles
//! - **Journal**: three mirrored log channels with bounded memory and file compaction
//! - **Lifecycle controller**: starts, pauses and resets monitoring on host signals
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use questfix::host::InMemoryHost;
//! use questfix::monitor::{LifecycleController, LifecycleSignal};
//! use questfix::time::SystemClock;
//!
//! # fn main() -> questfix::QuestFixResult<()> {
//! let host = Arc::new(InMemoryHost::new());
//! let controller = LifecycleController::load(
//!     Path::new("questfix.toml"),
//!     host.clone(),
//!     host.clone(),
//!     Arc::new(SystemClock),
//! )?;
//! controller.handle(LifecycleSignal::DataReady)?;
//! controller.handle(LifecycleSignal::NewSession)?;
//! // ... host events are delivered through `controller.dispatch(..)` ...
//! controller.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod host;
pub mod identifiers;
pub mod journal;
pub mod monitor;
pub mod progress;
pub mod time;

pub use config::Settings;
pub use error::{ConfigError, JournalError, QuestFixError, QuestFixResult};
pub use host::{Actions, FormId, Inspector};
pub use identifiers::{IdentifierResolver, ResolvedIdentifiers};
pub use journal::{Channel, Journal, Level, LogRoots};
pub use monitor::{EventSinks, HostEvent, LifecycleController, LifecycleSignal, MonitorContext, Poller};
pub use progress::{ProgressMachine, ProgressSnapshot, ProgressState, Stage};
