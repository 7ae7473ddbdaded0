//! The repo registry - the root object of the versioning core.
//!
//! `Registry` owns repo existence, the provenance graph, and deletion
//! protection, and composes the commit graph, branch directory, and file
//! tree engine per repository. Every operation a transport layer would
//! expose hangs off it.
//!
//! Thread-safe: clone to share across threads - it uses Arc internally.
//! Construct as many independent registries as you like; there is no global
//! state.
//!
//! The repo table's write lock is the single point of serialization for
//! repo-level mutations: an existence check and insert (create), or a
//! dependent scan and removal (delete), always happen under one guard, so
//! concurrent identical creates yield exactly one winner and a create can
//! never race a delete into a dangling provenance reference. Operations on
//! different repos only share that table briefly and otherwise proceed on
//! their own repo's locks.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::block::BlockStore;
use crate::config::Config;
use crate::fs::error::{FsError, FsResult};
use crate::fs::refs;
use crate::fs::repo::RepoCore;
use crate::fs::subscribe::CommitStream;
use crate::fs::types::{BranchInfo, CommitId, CommitInfo, FileInfo, RepoInfo, RepoName};

/// The root object of the versioning core.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    store: Arc<dyn BlockStore>,
    config: Config,
    repos: RwLock<HashMap<String, Arc<RepoCore>>>,
    repo_seq: AtomicU64,
}

impl Registry {
    /// Create a registry over the given content store with default settings.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self::with_config(store, Config::default())
    }

    /// Create a registry with explicit settings.
    pub fn with_config(store: Arc<dyn BlockStore>, config: Config) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                config,
                repos: RwLock::new(HashMap::new()),
                repo_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Get the content store this registry writes through.
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.inner.store
    }

    fn repo(&self, name: &str) -> FsResult<Arc<RepoCore>> {
        self.inner
            .repos
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::RepoNotFound(name.to_string()))
    }

    // ==================== Repo Registry ====================

    /// Create a repo.
    ///
    /// Every provenance entry must name an existing repo; on any failure
    /// nothing is created. Concurrent identical calls yield exactly one
    /// success, the rest observe `AlreadyExists`.
    pub fn create_repo(&self, name: &str, provenance: &[&str]) -> FsResult<()> {
        let name = RepoName::new(name)?;

        let mut repos = self.inner.repos.write();
        if repos.contains_key(name.as_str()) {
            return Err(FsError::AlreadyExists(name.as_str().to_string()));
        }
        let mut prov = Vec::with_capacity(provenance.len());
        for entry in provenance {
            if !repos.contains_key(*entry) {
                return Err(FsError::UnknownProvenance(entry.to_string()));
            }
            // an existing repo's name always re-validates
            prov.push(RepoName::new(*entry)?);
        }

        let seq = self.inner.repo_seq.fetch_add(1, Ordering::Relaxed);
        let core = RepoCore::new(
            name.clone(),
            prov,
            seq,
            self.inner.config.default_branch.clone(),
        );
        repos.insert(name.as_str().to_string(), Arc::new(core));
        drop(repos);

        debug!(repo = %name, "created repo");
        Ok(())
    }

    /// Creation time, aggregate size, and provenance of a repo.
    pub fn inspect_repo(&self, name: &str) -> FsResult<RepoInfo> {
        let core = self.repo(name)?;
        Ok(repo_info(&core))
    }

    /// Repos in creation order.
    ///
    /// With a filter, only repos whose provenance is a superset of it;
    /// every filter entry must name an existing repo.
    pub fn list_repo(&self, provenance_filter: &[&str]) -> FsResult<Vec<RepoInfo>> {
        let mut cores: Vec<Arc<RepoCore>> = {
            let repos = self.inner.repos.read();
            for entry in provenance_filter {
                if !repos.contains_key(*entry) {
                    return Err(FsError::UnknownProvenance(entry.to_string()));
                }
            }
            repos.values().cloned().collect()
        };

        cores.retain(|core| {
            provenance_filter
                .iter()
                .all(|entry| core.provenance.iter().any(|p| p.as_str() == *entry))
        });
        cores.sort_by_key(|core| core.seq);
        Ok(cores.iter().map(|core| repo_info(core)).collect())
    }

    /// Delete a repo along with all of its commits and branches.
    ///
    /// Without `force`, fails while any other repo lists it as provenance.
    /// With `force`, dependents are left with a dangling reference.
    pub fn delete_repo(&self, name: &str, force: bool) -> FsResult<()> {
        let core = {
            let mut repos = self.inner.repos.write();
            let core = repos
                .get(name)
                .cloned()
                .ok_or_else(|| FsError::RepoNotFound(name.to_string()))?;

            if !force {
                let mut dependents: Vec<String> = repos
                    .values()
                    .filter(|other| other.provenance.iter().any(|p| p.as_str() == name))
                    .map(|other| other.name.as_str().to_string())
                    .collect();
                if !dependents.is_empty() {
                    dependents.sort();
                    return Err(FsError::ProvenanceConflict {
                        repo: name.to_string(),
                        dependents,
                    });
                }
            }

            repos.remove(name);
            core
        };

        core.deleted.store(true, Ordering::SeqCst);
        core.watch.notify();
        debug!(repo = %name, force, "deleted repo");
        Ok(())
    }

    // ==================== Commit Graph ====================

    /// Start an open commit.
    ///
    /// `parent_ref` is empty (root commit), a commit reference, or a branch
    /// name; naming a branch makes its head the parent and atomically
    /// repoints the branch at the new open commit.
    pub fn start_commit(&self, repo: &str, parent_ref: &str) -> FsResult<CommitId> {
        self.repo(repo)?.start_commit(parent_ref)
    }

    /// Seal an open commit, merging its diff onto the parent snapshot.
    pub fn finish_commit(&self, repo: &str, reference: &str) -> FsResult<()> {
        self.repo(repo)?.finish_commit(reference)
    }

    pub fn inspect_commit(&self, repo: &str, reference: &str) -> FsResult<CommitInfo> {
        self.repo(repo)?.inspect_commit(reference)
    }

    /// Commits newest-first from `from` (default: every branch head) back to
    /// `until` (exclusive); `limit` of 0 means unlimited.
    pub fn list_commit(
        &self,
        repo: &str,
        from: &str,
        until: &str,
        limit: usize,
    ) -> FsResult<Vec<CommitInfo>> {
        self.repo(repo)?.list_commit(from, until, limit)
    }

    /// Stream finished commits on a branch, starting strictly after `from`
    /// (or from the root if empty), until the stream is closed.
    pub fn subscribe_commit(&self, repo: &str, branch: &str, from: &str) -> FsResult<CommitStream> {
        let core = self.repo(repo)?;
        let from = if from.is_empty() {
            None
        } else {
            Some(refs::resolve_ref(&core, from)?)
        };
        Ok(CommitStream::new(core, branch.to_string(), from))
    }

    // ==================== Branch Directory ====================

    pub fn set_branch(&self, repo: &str, commit_ref: &str, branch: &str) -> FsResult<()> {
        self.repo(repo)?.set_branch(commit_ref, branch)
    }

    /// Branches most-recently-pointed-first.
    pub fn list_branch(&self, repo: &str) -> FsResult<Vec<BranchInfo>> {
        Ok(self.repo(repo)?.list_branch())
    }

    pub fn delete_branch(&self, repo: &str, branch: &str) -> FsResult<()> {
        self.repo(repo)?.delete_branch(branch)
    }

    // ==================== File Tree ====================

    /// Append content to a file in an open commit; returns the bytes written.
    pub fn put_file(
        &self,
        repo: &str,
        reference: &str,
        path: &str,
        source: impl Read,
    ) -> FsResult<u64> {
        self.repo(repo)?.put_file(
            self.inner.store.as_ref(),
            self.inner.config.block_size,
            reference,
            path,
            source,
        )
    }

    /// Tombstone a path (and its descendants) relative to the parent snapshot.
    pub fn delete_file(&self, repo: &str, reference: &str, path: &str) -> FsResult<()> {
        self.repo(repo)?.delete_file(reference, path)
    }

    /// Record an explicit directory, independent of any file put.
    pub fn make_directory(&self, repo: &str, reference: &str, path: &str) -> FsResult<()> {
        self.repo(repo)?.make_directory(reference, path)
    }

    /// Read `[offset, offset+size)` of a file; size 0 reads to the end.
    pub fn get_file(
        &self,
        repo: &str,
        reference: &str,
        path: &str,
        offset: u64,
        size: u64,
    ) -> FsResult<Vec<u8>> {
        self.repo(repo)?
            .get_file(self.inner.store.as_ref(), reference, path, offset, size)
    }

    pub fn inspect_file(&self, repo: &str, reference: &str, path: &str) -> FsResult<FileInfo> {
        self.repo(repo)?.inspect_file(reference, path)
    }

    /// Immediate children of a directory.
    pub fn list_file(&self, repo: &str, reference: &str, path: &str) -> FsResult<Vec<FileInfo>> {
        self.repo(repo)?.list_file(reference, path)
    }
}

fn repo_info(core: &RepoCore) -> RepoInfo {
    RepoInfo {
        name: core.name.as_str().to_string(),
        created: core.created,
        size_bytes: core.size_bytes(),
        provenance: core
            .provenance
            .iter()
            .map(|p| p.as_str().to_string())
            .collect(),
    }
}
