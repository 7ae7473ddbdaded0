//! commit lifecycle
//!
//! A commit is OPEN from `start_commit` until `finish_commit` seals it;
//! FINISHED is terminal. While open, the cell holds the accumulating diff
//! log; once finished it holds the merged tree, the finish timestamp, and
//! the computed size. The state lock doubles as the finish barrier: a write
//! that observes FINISHED fails with `NotOpen` instead of tearing the log.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::fs::tree::{DiffLog, FileTree};
use crate::fs::types::{CommitId, CommitInfo};

/// lifecycle state of a commit
pub(crate) enum CommitState {
    /// accepting writes
    Open(DiffLog),
    /// sealed; the tree never mutates again
    Finished {
        finished: DateTime<Utc>,
        size: u64,
        tree: FileTree,
    },
}

/// a commit and its mutable lifecycle state
pub(crate) struct CommitCell {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    /// per-repo monotonic creation sequence, used for newest-first ordering
    pub seq: u64,
    pub started: DateTime<Utc>,
    pub state: RwLock<CommitState>,
}

impl CommitCell {
    pub fn new(parent: Option<CommitId>, seq: u64) -> Self {
        Self {
            id: CommitId::generate(),
            parent,
            seq,
            started: Utc::now(),
            state: RwLock::new(CommitState::Open(DiffLog::new())),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(&*self.state.read(), CommitState::Finished { .. })
    }

    /// The finished tree, if sealed. Cloning shares node payloads.
    pub fn finished_tree(&self) -> Option<FileTree> {
        match &*self.state.read() {
            CommitState::Finished { tree, .. } => Some(tree.clone()),
            CommitState::Open(_) => None,
        }
    }

    pub fn info(&self, repo: &str) -> CommitInfo {
        let (finished, size_bytes) = match &*self.state.read() {
            CommitState::Open(_) => (None, 0),
            CommitState::Finished { finished, size, .. } => (Some(*finished), *size),
        };
        CommitInfo {
            id: self.id.clone(),
            repo: repo.to_string(),
            parent: self.parent.clone(),
            started: self.started,
            finished,
            size_bytes,
        }
    }
}
