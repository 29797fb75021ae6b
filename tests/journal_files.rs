use std::fs;

use tempfile::tempdir;

use questfix::journal::{Channel, Journal, LogRoots, COMPACTION_THRESHOLD, RING_CAPACITY};

fn open(dir: &std::path::Path) -> Journal {
    Journal::open(LogRoots::new(dir.join("primary"), dir.join("secondary"))).unwrap()
}

fn file_lines(journal: &Journal, channel: Channel) -> (Vec<String>, Vec<String>) {
    let paths = journal.file_paths(channel);
    assert_eq!(paths.len(), 2);
    let read = |path: &std::path::PathBuf| {
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect::<Vec<_>>()
    };
    (read(&paths[0]), read(&paths[1]))
}

#[test]
fn ring_buffer_evicts_oldest_line() {
    let dir = tempdir().unwrap();
    let journal = open(dir.path());

    for i in 0..=RING_CAPACITY {
        journal.info(Channel::Actions, format!("entry {i}"));
    }

    let lines = journal.lines(Channel::Actions);
    assert_eq!(lines.len(), RING_CAPACITY);
    assert!(lines[0].ends_with("] entry 1"));
    assert!(lines[RING_CAPACITY - 1].ends_with(&format!("] entry {RING_CAPACITY}")));

    // Below the compaction threshold the files keep every line.
    let (primary, secondary) = file_lines(&journal, Channel::Actions);
    assert_eq!(primary.len(), RING_CAPACITY + 1);
    assert_eq!(primary, secondary);
}

#[test]
fn compaction_rewrites_files_from_buffer() {
    let dir = tempdir().unwrap();
    let journal = open(dir.path());

    for i in 0..COMPACTION_THRESHOLD {
        journal.info(Channel::Quest, format!("entry {i}"));
    }

    let buffer = journal.lines(Channel::Quest);
    let (primary, secondary) = file_lines(&journal, Channel::Quest);
    assert_eq!(primary, buffer);
    assert_eq!(secondary, buffer);
    assert_eq!(journal.appends_since_compaction(Channel::Quest), RING_CAPACITY);

    // Appends resume on top of the compacted file.
    journal.info(Channel::Quest, "after compaction");
    let (primary, _) = file_lines(&journal, Channel::Quest);
    assert_eq!(primary.len(), RING_CAPACITY + 1);
    assert!(primary.last().unwrap().ends_with("] after compaction"));
    assert_eq!(journal.appends_since_compaction(Channel::Quest), RING_CAPACITY + 1);
}

#[test]
fn channels_compact_independently() {
    let dir = tempdir().unwrap();
    let journal = open(dir.path());

    for i in 0..COMPACTION_THRESHOLD {
        journal.info(Channel::System, format!("entry {i}"));
    }
    journal.info(Channel::Actions, "lonely");

    assert_eq!(journal.appends_since_compaction(Channel::System), RING_CAPACITY);
    assert_eq!(journal.appends_since_compaction(Channel::Actions), 1);
    let (actions, _) = file_lines(&journal, Channel::Actions);
    assert_eq!(actions.len(), 1);
}

#[test]
fn broken_primary_does_not_block_secondary() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let journal =
        Journal::open(LogRoots::new(blocker.join("primary"), dir.path().join("secondary"))).unwrap();
    for i in 0..COMPACTION_THRESHOLD {
        journal.info(Channel::Actions, format!("entry {i}"));
    }

    let (primary, secondary) = file_lines(&journal, Channel::Actions);
    assert!(primary.is_empty());
    assert_eq!(secondary, journal.lines(Channel::Actions));
}

#[test]
fn files_use_fixed_channel_names() {
    let dir = tempdir().unwrap();
    let journal = open(dir.path());
    for channel in Channel::ALL {
        journal.info(channel, "hello");
    }

    for name in ["QuestFix-Actions.log", "QuestFix-Quest.log", "QuestFix-System.log"] {
        assert!(dir.path().join("primary").join(name).exists(), "{name} missing");
        assert!(dir.path().join("secondary").join(name).exists(), "{name} missing");
    }
}
