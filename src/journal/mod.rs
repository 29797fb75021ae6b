//! Three-channel mirrored journal.
//!
//! The journal is the monitor's own record of what it saw and did. It has
//! exactly three channels (`actions`, `quest`, `system`). Each channel keeps
//! its newest [`RING_CAPACITY`] lines in memory and writes every line to the
//! same file name under two root directories. Every [`COMPACTION_THRESHOLD`]
//! appends the files are rewritten from the buffer so they stay bounded.
//!
//! Writing never fails from the caller's point of view. The only fatal case is
//! opening a journal when no log directory can be determined or created.
//!
//! Lines look like:
//!
//! ```text
//! [2024-01-31 17:04:05.123] [quest] [info] [machine.rs:88] TRIGGER STAGE REACHED
//! ```

mod channel;
mod sink;

use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::LoggingSettings;
use crate::error::JournalError;
use crate::time;

use channel::LogChannel;
use sink::MirroredFile;

pub use channel::{COMPACTION_THRESHOLD, RING_CAPACITY};

/// Rule line used to frame banners.
pub const BANNER_RULE: &str = "========================================";

/// The three fixed journal channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Player-visible actions: detections, removals, messages, menus.
    Actions,
    /// Quest activation, stage changes, trigger and completion.
    Quest,
    /// Plugin and worker lifecycle.
    System,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Actions, Self::Quest, Self::System];

    /// Tag written into each line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Actions => "actions",
            Self::Quest => "quest",
            Self::System => "system",
        }
    }

    /// File name used under both roots.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Actions => "QuestFix-Actions.log",
            Self::Quest => "QuestFix-Quest.log",
            Self::System => "QuestFix-System.log",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Actions => 0,
            Self::Quest => 1,
            Self::System => 2,
        }
    }
}

/// Severity of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The two directories every channel is mirrored into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRoots {
    pub primary: PathBuf,
    pub secondary: PathBuf,
}

impl LogRoots {
    #[must_use]
    pub fn new(primary: impl Into<PathBuf>, secondary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Default roots under the user's documents directory.
    #[must_use]
    pub fn discover() -> Option<Self> {
        let games = dirs::document_dir()?.join("My Games");
        Some(Self::new(
            games.join("Skyrim Special Edition").join("SKSE"),
            games.join("Skyrim.INI").join("SKSE"),
        ))
    }

    /// Configured roots, with discovered defaults for any left unset.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings) -> Option<Self> {
        match (&settings.primary_dir, &settings.secondary_dir) {
            (Some(primary), Some(secondary)) => Some(Self::new(primary, secondary)),
            (primary, secondary) => {
                let discovered = Self::discover()?;
                Some(Self::new(
                    primary.clone().unwrap_or(discovered.primary),
                    secondary.clone().unwrap_or(discovered.secondary),
                ))
            }
        }
    }
}

/// Three-channel mirrored journal.
#[derive(Debug)]
pub struct Journal {
    channels: [LogChannel; 3],
    roots: Option<LogRoots>,
}

impl Journal {
    /// Opens a journal writing under `roots`.
    ///
    /// At least one root must be non-empty and creatable; a root that cannot
    /// be created now is still written to later in case it comes back. An
    /// empty root gets no file, so nothing lands in the working directory.
    pub fn open(roots: LogRoots) -> Result<Self, JournalError> {
        let usable = |dir: &Path| !dir.as_os_str().is_empty() && fs::create_dir_all(dir).is_ok();

        if roots.primary.as_os_str().is_empty() && roots.secondary.as_os_str().is_empty() {
            return Err(JournalError::NoLogDirectory);
        }
        let primary_ok = usable(&roots.primary);
        let secondary_ok = usable(&roots.secondary);
        if !primary_ok && !secondary_ok {
            return Err(JournalError::NoWritableDirectory {
                primary: roots.primary,
                secondary: roots.secondary,
            });
        }
        if !primary_ok || !secondary_ok {
            tracing::warn!(
                primary = %roots.primary.display(),
                secondary = %roots.secondary.display(),
                primary_ok,
                secondary_ok,
                "journal running with a single usable root"
            );
        }

        let file_under = |root: &Path, channel: Channel| {
            (!root.as_os_str().is_empty()).then(|| root.join(channel.file_name()))
        };
        let channels = Channel::ALL.map(|channel| {
            let files = MirroredFile::new(
                file_under(&roots.primary, channel),
                file_under(&roots.secondary, channel),
            );
            LogChannel::new(channel, Some(files))
        });

        Ok(Self {
            channels,
            roots: Some(roots),
        })
    }

    /// Opens a journal as described by the `[Logging]` settings.
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, JournalError> {
        if !settings.enabled {
            return Ok(Self::in_memory());
        }
        let roots = LogRoots::from_settings(settings).ok_or(JournalError::NoLogDirectory)?;
        Self::open(roots)
    }

    /// A journal that buffers lines but writes no files.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            channels: Channel::ALL.map(|channel| LogChannel::new(channel, None)),
            roots: None,
        }
    }

    /// Roots being written to, if any.
    #[must_use]
    pub fn roots(&self) -> Option<&LogRoots> {
        self.roots.as_ref()
    }

    fn channel(&self, channel: Channel) -> &LogChannel {
        &self.channels[channel.index()]
    }

    /// Paths of `channel`'s files, primary first. Empty for an in-memory
    /// journal; a single path when one root is empty.
    #[must_use]
    pub fn file_paths(&self, channel: Channel) -> Vec<PathBuf> {
        self.channel(channel)
            .files()
            .map(|f| {
                [f.primary(), f.secondary()]
                    .into_iter()
                    .flatten()
                    .map(Path::to_path_buf)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Appends one line. The source locator is the caller's location.
    #[track_caller]
    pub fn record(&self, channel: Channel, level: Level, message: &str) {
        let location = Location::caller();
        let file = Path::new(location.file())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_else(|| location.file());

        match level {
            Level::Info => tracing::info!(target: "questfix::journal", channel = channel.name(), "{message}"),
            Level::Warn => tracing::warn!(target: "questfix::journal", channel = channel.name(), "{message}"),
            Level::Error => tracing::error!(target: "questfix::journal", channel = channel.name(), "{message}"),
        }

        self.channel(channel).push(|| {
            format!(
                "[{}] [{}] [{}] [{}:{}] {}",
                time::format_millis(Local::now()),
                channel.name(),
                level.as_str(),
                file,
                location.line(),
                message
            )
        });
    }

    #[track_caller]
    pub fn info(&self, channel: Channel, message: impl AsRef<str>) {
        self.record(channel, Level::Info, message.as_ref());
    }

    #[track_caller]
    pub fn warn(&self, channel: Channel, message: impl AsRef<str>) {
        self.record(channel, Level::Warn, message.as_ref());
    }

    #[track_caller]
    pub fn error(&self, channel: Channel, message: impl AsRef<str>) {
        self.record(channel, Level::Error, message.as_ref());
    }

    /// Writes `lines` framed by rule lines.
    #[track_caller]
    pub fn banner<I, S>(&self, channel: Channel, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.record(channel, Level::Info, BANNER_RULE);
        for line in lines {
            self.record(channel, Level::Info, line.as_ref());
        }
        self.record(channel, Level::Info, BANNER_RULE);
    }

    /// Buffered lines of `channel`, oldest first.
    #[must_use]
    pub fn lines(&self, channel: Channel) -> Vec<String> {
        self.channel(channel).snapshot()
    }

    /// Appends counted towards the next compaction of `channel`.
    #[must_use]
    pub fn appends_since_compaction(&self, channel: Channel) -> usize {
        self.channel(channel).appends()
    }

    /// True if any buffered line of `channel` contains `needle`.
    #[must_use]
    pub fn contains(&self, channel: Channel, needle: &str) -> bool {
        self.channel(channel).snapshot().iter().any(|line| line.contains(needle))
    }

    /// Empties every channel's files; the in-memory buffers are kept.
    pub fn truncate_files(&self) {
        for channel in &self.channels {
            tracing::debug!(channel = channel.channel().name(), "truncating journal files");
            channel.truncate_files();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_line_format() {
        let journal = Journal::in_memory();
        journal.warn(Channel::Quest, "hello");

        let lines = journal.lines(Channel::Quest);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.starts_with('['));
        assert!(line.contains("] [quest] [warn] [mod.rs:"));
        assert!(line.ends_with("] hello"));
    }

    #[test]
    fn test_channels_are_independent() {
        let journal = Journal::in_memory();
        journal.info(Channel::Actions, "a");
        journal.info(Channel::System, "s");
        journal.info(Channel::System, "s2");

        assert_eq!(journal.lines(Channel::Actions).len(), 1);
        assert_eq!(journal.lines(Channel::Quest).len(), 0);
        assert_eq!(journal.lines(Channel::System).len(), 2);
    }

    #[test]
    fn test_concurrent_writers_keep_timestamps_in_order() {
        let journal = Journal::in_memory();
        std::thread::scope(|s| {
            for t in 0..4 {
                let journal = &journal;
                s.spawn(move || {
                    for i in 0..200 {
                        journal.info(Channel::Actions, format!("writer {t} line {i}"));
                    }
                });
            }
        });

        // `[YYYY-MM-DD HH:MM:SS.mmm]` is fixed width, so text order is time order.
        let stamps: Vec<String> = journal
            .lines(Channel::Actions)
            .iter()
            .map(|line| line[..25].to_string())
            .collect();
        assert_eq!(stamps.len(), 800);
        assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_banner_is_framed() {
        let journal = Journal::in_memory();
        journal.banner(Channel::System, ["TITLE", "detail"]);

        let lines = journal.lines(Channel::System);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with(BANNER_RULE));
        assert!(lines[1].ends_with("TITLE"));
        assert!(lines[3].ends_with(BANNER_RULE));
    }

    #[test]
    fn test_open_writes_both_roots() {
        let dir = tempdir().unwrap();
        let roots = LogRoots::new(dir.path().join("primary"), dir.path().join("secondary"));
        let journal = Journal::open(roots).unwrap();

        journal.info(Channel::Actions, "first");
        journal.info(Channel::Actions, "second");

        let paths = journal.file_paths(Channel::Actions);
        assert_eq!(paths.len(), 2);
        let p = fs::read_to_string(&paths[0]).unwrap();
        let s = fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(p, s);
        assert_eq!(p.lines().count(), 2);
        assert!(p.lines().nth(1).unwrap().ends_with("second"));
    }

    #[test]
    fn test_open_rejects_empty_roots() {
        let err = Journal::open(LogRoots::new("", "")).unwrap_err();
        assert!(matches!(err, JournalError::NoLogDirectory));
    }

    #[test]
    fn test_open_rejects_unwritable_roots() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = Journal::open(LogRoots::new(blocker.join("a"), blocker.join("b"))).unwrap_err();
        assert!(matches!(err, JournalError::NoWritableDirectory { .. }));
    }

    #[test]
    fn test_open_tolerates_one_bad_root() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let journal = Journal::open(LogRoots::new(blocker.join("a"), dir.path().join("ok"))).unwrap();
        journal.info(Channel::System, "still logging");

        let paths = journal.file_paths(Channel::System);
        assert_eq!(paths.len(), 2);
        assert!(fs::read_to_string(&paths[1]).unwrap().contains("still logging"));
    }

    #[test]
    fn test_empty_root_gets_no_file() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(LogRoots::new("", dir.path().join("ok"))).unwrap();
        journal.info(Channel::System, "only one side");

        let paths = journal.file_paths(Channel::System);
        assert_eq!(paths, vec![dir.path().join("ok").join(Channel::System.file_name())]);
        assert!(fs::read_to_string(&paths[0]).unwrap().contains("only one side"));
        assert!(!Path::new(Channel::System.file_name()).exists());
    }

    #[test]
    fn test_disabled_logging_writes_no_files() {
        let dir = tempdir().unwrap();
        let settings = LoggingSettings {
            enabled: false,
            primary_dir: Some(dir.path().join("p")),
            secondary_dir: Some(dir.path().join("s")),
        };
        let journal = Journal::from_settings(&settings).unwrap();
        journal.info(Channel::Quest, "buffered only");

        assert!(journal.roots().is_none());
        assert!(journal.contains(Channel::Quest, "buffered only"));
        assert!(!dir.path().join("p").exists());
    }

    #[test]
    fn test_truncate_files_keeps_buffer() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(LogRoots::new(dir.path().join("p"), dir.path().join("s"))).unwrap();
        journal.info(Channel::Quest, "old session");
        journal.truncate_files();

        let paths = journal.file_paths(Channel::Quest);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "");
        assert_eq!(journal.lines(Channel::Quest).len(), 1);
    }
}
