//! per-repo versioning state
//!
//! `RepoCore` composes one repository's commit table, branch set, implicit
//! default-branch history, and subscriber watch channel. The registry owns a
//! table of cores and delegates every repo-scoped operation here.
//!
//! Lock order within a core: branches, then commits, then history. The watch
//! channel is only ever notified after all other guards are dropped.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::block::BlockStore;
use crate::fs::commit::{CommitCell, CommitState};
use crate::fs::error::{FsError, FsResult};
use crate::fs::refs::{self, BranchSet};
use crate::fs::subscribe::Watch;
use crate::fs::tree::{self, DiffLog, FileTree};
use crate::fs::types::{
    BranchInfo, BranchName, CommitId, CommitInfo, FileInfo, FilePath, RepoName,
};

pub(crate) struct RepoCore {
    pub name: RepoName,
    pub created: DateTime<Utc>,
    /// registry-wide creation sequence, for stable repo list ordering
    pub seq: u64,
    /// provenance repo names in declared order, immutable after creation
    pub provenance: Vec<RepoName>,
    pub default_branch: String,
    pub commits: RwLock<HashMap<CommitId, Arc<CommitCell>>>,
    commit_seq: AtomicU64,
    pub branches: Mutex<BranchSet>,
    /// every started commit in creation order; backs positional refs and the
    /// implicit default head
    pub history: Mutex<Vec<CommitId>>,
    pub watch: Watch,
    /// flipped by repo deletion so subscribers terminate
    pub deleted: AtomicBool,
}

impl RepoCore {
    pub fn new(name: RepoName, provenance: Vec<RepoName>, seq: u64, default_branch: String) -> Self {
        Self {
            name,
            created: Utc::now(),
            seq,
            provenance,
            default_branch,
            commits: RwLock::new(HashMap::new()),
            commit_seq: AtomicU64::new(0),
            branches: Mutex::new(BranchSet::new()),
            history: Mutex::new(Vec::new()),
            watch: Watch::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn next_commit_seq(&self) -> u64 {
        self.commit_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn commit(&self, id: &CommitId) -> FsResult<Arc<CommitCell>> {
        self.commits
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FsError::CommitNotFound {
                repo: self.name.as_str().to_string(),
                reference: id.as_str().to_string(),
            })
    }

    // ==================== Commit Graph ====================

    /// Start a new open commit.
    ///
    /// `parent_ref` is empty (root commit), a commit reference, or a branch
    /// name. Naming a branch makes the branch head the parent and atomically
    /// repoints the branch at the new open commit; reads and writes
    /// addressed by the branch name then land on it.
    pub fn start_commit(&self, parent_ref: &str) -> FsResult<CommitId> {
        let mut started: Option<CommitId> = None;
        {
            // branch parent: commit creation and head swap are one tagged
            // transition under the branch lock
            let mut branches = self.branches.lock();
            if let Some(head) = branches.get(parent_ref) {
                let cell = Arc::new(CommitCell::new(Some(head), self.next_commit_seq()));
                let id = cell.id.clone();
                self.commits.write().insert(id.clone(), cell);
                branches.set(parent_ref, id.clone());
                started = Some(id);
            }
        }

        let id = match started {
            Some(id) => id,
            None => {
                let parent = if parent_ref.is_empty() {
                    None
                } else {
                    Some(refs::resolve_ref(self, parent_ref)?)
                };
                let cell = Arc::new(CommitCell::new(parent, self.next_commit_seq()));
                let id = cell.id.clone();
                self.commits.write().insert(id.clone(), cell);
                id
            }
        };

        self.history.lock().push(id.clone());
        debug!(repo = %self.name, commit = %id, "started commit");
        self.watch.notify();
        Ok(id)
    }

    /// Merge the commit's diff onto its parent snapshot and seal it.
    ///
    /// On `PathConflict` the commit stays open and keeps its log.
    pub fn finish_commit(&self, reference: &str) -> FsResult<()> {
        let id = refs::resolve_ref(self, reference)?;
        let cell = self.commit(&id)?;

        let parent_tree = match &cell.parent {
            Some(parent_id) => {
                let parent = self.commit(parent_id)?;
                match parent.finished_tree() {
                    Some(tree) => Some(tree),
                    None => return Err(FsError::NotFinished(parent_id.as_str().to_string())),
                }
            }
            None => None,
        };

        {
            let mut state = cell.state.write();
            let log = match &*state {
                CommitState::Open(log) => log,
                CommitState::Finished { .. } => {
                    return Err(FsError::NotOpen(id.as_str().to_string()))
                }
            };
            let merged = tree::merge(parent_tree.as_ref(), log)?;
            let size = merged.total_size();
            *state = CommitState::Finished {
                finished: Utc::now(),
                size,
                tree: merged,
            };
        }

        debug!(repo = %self.name, commit = %id, "finished commit");
        self.watch.notify();
        Ok(())
    }

    pub fn inspect_commit(&self, reference: &str) -> FsResult<CommitInfo> {
        let id = refs::resolve_ref(self, reference)?;
        Ok(self.commit(&id)?.info(self.name.as_str()))
    }

    /// Walk ancestry newest-first from `from` (default: every branch head),
    /// stopping at `until` (exclusive). A limit of 0 means unlimited.
    pub fn list_commit(&self, from: &str, until: &str, limit: usize) -> FsResult<Vec<CommitInfo>> {
        let heads = if from.is_empty() {
            self.head_commits()
        } else {
            vec![refs::resolve_ref(self, from)?]
        };
        let until_id = if until.is_empty() {
            None
        } else {
            Some(refs::resolve_ref(self, until)?)
        };

        let mut cells: Vec<Arc<CommitCell>> = Vec::new();
        {
            let commits = self.commits.read();
            let mut seen: HashSet<CommitId> = HashSet::new();
            for head in heads {
                let mut cursor = Some(head);
                while let Some(id) = cursor {
                    if until_id.as_ref() == Some(&id) {
                        break;
                    }
                    if !seen.insert(id.clone()) {
                        break;
                    }
                    let Some(cell) = commits.get(&id) else { break };
                    cursor = cell.parent.clone();
                    cells.push(cell.clone());
                }
            }
        }

        cells.sort_by(|a, b| b.seq.cmp(&a.seq));
        if limit > 0 {
            cells.truncate(limit);
        }
        Ok(cells
            .iter()
            .map(|cell| cell.info(self.name.as_str()))
            .collect())
    }

    /// Explicit branch heads plus the implicit default head.
    fn head_commits(&self) -> Vec<CommitId> {
        let mut heads = self.branches.lock().heads();
        if let Some(last) = self.history.lock().last() {
            heads.push(last.clone());
        }
        heads
    }

    /// Aggregate size: finished commits reachable from all heads, dedup.
    pub fn size_bytes(&self) -> u64 {
        let heads = self.head_commits();
        let commits = self.commits.read();

        let mut seen: HashSet<CommitId> = HashSet::new();
        let mut total = 0u64;
        for head in heads {
            let mut cursor = Some(head);
            while let Some(id) = cursor {
                if !seen.insert(id.clone()) {
                    break;
                }
                let Some(cell) = commits.get(&id) else { break };
                cursor = cell.parent.clone();
                if let CommitState::Finished { size, .. } = &*cell.state.read() {
                    total += size;
                }
            }
        }
        total
    }

    // ==================== Branch Directory ====================

    pub fn set_branch(&self, commit_ref: &str, branch: &str) -> FsResult<()> {
        let branch = BranchName::new(branch)?;
        let id = refs::resolve_ref(self, commit_ref)?;
        self.branches.lock().set(branch.as_str(), id);
        self.watch.notify();
        Ok(())
    }

    pub fn list_branch(&self) -> Vec<BranchInfo> {
        self.branches.lock().list()
    }

    /// Remove the name only; the commits it pointed at are unaffected.
    pub fn delete_branch(&self, branch: &str) -> FsResult<()> {
        let removed = self.branches.lock().remove(branch);
        if !removed {
            return Err(FsError::BranchNotFound {
                repo: self.name.as_str().to_string(),
                branch: branch.to_string(),
            });
        }
        self.watch.notify();
        Ok(())
    }

    // ==================== File Tree ====================

    /// Run `f` against the commit's open diff log, failing `NotOpen` once
    /// the commit is finished. The state lock is the finish barrier.
    fn with_open_log<T>(&self, reference: &str, f: impl FnOnce(&mut DiffLog) -> T) -> FsResult<T> {
        let id = refs::resolve_ref(self, reference)?;
        let cell = self.commit(&id)?;
        let mut state = cell.state.write();
        match &mut *state {
            CommitState::Open(log) => Ok(f(log)),
            CommitState::Finished { .. } => Err(FsError::NotOpen(id.as_str().to_string())),
        }
    }

    /// The finished snapshot a read operates on.
    fn finished_tree(&self, reference: &str) -> FsResult<FileTree> {
        let id = refs::resolve_ref(self, reference)?;
        let cell = self.commit(&id)?;
        cell.finished_tree()
            .ok_or_else(|| FsError::NotFinished(id.as_str().to_string()))
    }

    /// Append content to a file in an open commit.
    ///
    /// Repeated puts to one path concatenate; the block upload happens
    /// before the log lock is taken, so concurrent puts only serialize on
    /// the append itself.
    pub fn put_file(
        &self,
        store: &dyn BlockStore,
        block_size: usize,
        reference: &str,
        path: &str,
        mut source: impl Read,
    ) -> FsResult<u64> {
        let path = FilePath::new(path);
        let mut content = Vec::new();
        source.read_to_end(&mut content)?;

        let mut blocks = Vec::with_capacity(content.len() / block_size.max(1) + 1);
        for chunk in content.chunks(block_size.max(1)) {
            blocks.push(store.put_block(chunk)?);
        }
        let size = content.len() as u64;

        self.with_open_log(reference, |log| log.append_file(path, blocks, size))?;
        Ok(size)
    }

    /// Record a tombstone for the path (and, for a directory, everything
    /// under it) relative to the parent snapshot.
    pub fn delete_file(&self, reference: &str, path: &str) -> FsResult<()> {
        let path = FilePath::new(path);
        self.with_open_log(reference, |log| log.delete(path))
    }

    /// Record an explicit (possibly empty) directory.
    pub fn make_directory(&self, reference: &str, path: &str) -> FsResult<()> {
        let path = FilePath::new(path);
        self.with_open_log(reference, |log| log.make_dir(path))
    }

    pub fn get_file(
        &self,
        store: &dyn BlockStore,
        reference: &str,
        path: &str,
        offset: u64,
        size: u64,
    ) -> FsResult<Vec<u8>> {
        self.finished_tree(reference)?
            .read(store, &FilePath::new(path), offset, size)
    }

    pub fn inspect_file(&self, reference: &str, path: &str) -> FsResult<FileInfo> {
        self.finished_tree(reference)?.inspect(&FilePath::new(path))
    }

    pub fn list_file(&self, reference: &str, path: &str) -> FsResult<Vec<FileInfo>> {
        self.finished_tree(reference)?.list(&FilePath::new(path))
    }
}
