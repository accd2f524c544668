use serde::{Deserialize, Serialize};

use super::Command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub command: Command,
}

/// In-memory command log. The leader assigns indexes; followers mirror
/// whatever the leader sends them.
///
/// Indexes start at 1, so a commit index of 0 means nothing was committed.
#[derive(Debug)]
pub struct CommandLog {
    entries: Vec<LogEntry>,
    next_index: u64,
    commit_index: u64,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_index: 1,
            commit_index: 0,
        }
    }

    /// Leader side: wraps `command` in the next entry.
    pub fn append(&mut self, command: Command) -> LogEntry {
        let entry = LogEntry {
            index: self.next_index,
            command,
        };
        self.next_index += 1;
        self.entries.push(entry.clone());
        entry
    }

    /// Follower side: stores `entry` and reports whether it is new enough to
    /// apply, moving the commit index up to it when it is.
    ///
    /// There is no term or previous-index check here.
    pub fn append_replicated(&mut self, entry: LogEntry) -> bool {
        let index = entry.index;
        self.next_index = self.next_index.max(index + 1);
        self.entries.push(entry);

        if index > self.commit_index {
            self.commit_index = index;
            true
        } else {
            false
        }
    }

    pub fn commit(&mut self, index: u64) {
        self.commit_index = self.commit_index.max(index);
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    pub fn last_index(&self) -> u64 {
        self.next_index - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries.iter().rev().find(|e| e.index == index)
    }

    /// Entries above the commit index, in append order.
    pub fn uncommitted(&self) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.index > self.commit_index)
            .collect()
    }
}
