//! One journal channel: a bounded line buffer plus its mirrored files.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::sink::MirroredFile;
use super::Channel;

/// Lines kept in memory per channel.
pub const RING_CAPACITY: usize = 2000;

/// Appends after which the files are rewritten from the buffer.
pub const COMPACTION_THRESHOLD: usize = 2500;

/// What the files need after a line was pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flush {
    /// Append this single line.
    Line(String),
    /// Replace the file with this full buffer dump.
    Rewrite(String),
}

/// Bounded FIFO of formatted lines with an append counter.
#[derive(Debug, Default)]
pub(crate) struct RingState {
    lines: VecDeque<String>,
    appends: usize,
}

impl RingState {
    /// Pushes a line, evicting the oldest past capacity.
    ///
    /// Once the counter reaches the compaction threshold the whole buffer is
    /// returned for a rewrite and the counter restarts at the buffer length.
    pub(crate) fn push(&mut self, line: String) -> Flush {
        let single = format!("{line}\n");
        self.lines.push_back(line);
        if self.lines.len() > RING_CAPACITY {
            self.lines.pop_front();
        }
        self.appends += 1;

        if self.appends >= COMPACTION_THRESHOLD {
            self.appends = self.lines.len();
            Flush::Rewrite(self.dump())
        } else {
            Flush::Line(single)
        }
    }

    fn dump(&self) -> String {
        let mut body = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        body
    }

    pub(crate) fn lines(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn appends(&self) -> usize {
        self.appends
    }
}

#[derive(Debug)]
pub(crate) struct LogChannel {
    channel: Channel,
    state: Mutex<RingState>,
    files: Option<MirroredFile>,
}

impl LogChannel {
    pub(crate) fn new(channel: Channel, files: Option<MirroredFile>) -> Self {
        Self {
            channel,
            state: Mutex::new(RingState::default()),
            files,
        }
    }

    fn state(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn channel(&self) -> Channel {
        self.channel
    }

    pub(crate) fn files(&self) -> Option<&MirroredFile> {
        self.files.as_ref()
    }

    /// Renders a line, buffers it and writes it out. Rendering and file I/O
    /// happen under the channel lock, so timestamps and on-disk order always
    /// match the buffer order.
    pub(crate) fn push(&self, render: impl FnOnce() -> String) {
        let mut state = self.state();
        let flush = state.push(render());
        let Some(files) = &self.files else {
            return;
        };
        match flush {
            Flush::Line(text) => files.append(&text),
            Flush::Rewrite(body) => {
                tracing::debug!(channel = self.channel.name(), lines = state.len(), "journal compaction");
                files.rewrite(&body);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.state().lines().cloned().collect()
    }

    pub(crate) fn appends(&self) -> usize {
        self.state().appends()
    }

    pub(crate) fn truncate_files(&self) {
        let _state = self.state();
        if let Some(files) = &self.files {
            files.truncate();
        }
    }
}
