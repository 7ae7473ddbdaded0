//! branch pointers and reference resolution
//!
//! Branches are mutable name → commit mappings scoped to a repo, listed
//! most-recently-pointed-first. Reference strings accept three forms, tried
//! in order so the grammar stays in one place:
//!
//! 1. a raw commit identifier
//! 2. a branch name (resolves to the current head)
//! 3. `branch/N` - the Nth commit of that branch's history, zero-based from
//!    the root; falls back to the repo's implicit default-branch history
//!    when no explicit branch has the name

use std::collections::HashMap;

use crate::fs::error::{FsError, FsResult};
use crate::fs::repo::RepoCore;
use crate::fs::types::{BranchInfo, CommitId};

struct BranchEntry {
    head: CommitId,
    /// recency stamp; bumped on every pointer update
    touched: u64,
}

/// the branch table of one repo
#[derive(Default)]
pub(crate) struct BranchSet {
    entries: HashMap<String, BranchEntry>,
    counter: u64,
}

impl BranchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or repoint a branch; counts as the most recent update.
    pub fn set(&mut self, name: &str, head: CommitId) {
        self.counter += 1;
        let touched = self.counter;
        self.entries
            .insert(name.to_string(), BranchEntry { head, touched });
    }

    pub fn get(&self, name: &str) -> Option<CommitId> {
        self.entries.get(name).map(|entry| entry.head.clone())
    }

    /// Remove a branch. Returns false if it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Current heads, most-recently-updated first.
    pub fn list(&self) -> Vec<BranchInfo> {
        let mut entries: Vec<(&String, &BranchEntry)> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.1.touched.cmp(&a.1.touched));
        entries
            .into_iter()
            .map(|(name, entry)| BranchInfo {
                name: name.clone(),
                head: entry.head.clone(),
            })
            .collect()
    }

    pub fn heads(&self) -> Vec<CommitId> {
        self.entries
            .values()
            .map(|entry| entry.head.clone())
            .collect()
    }
}

/// Resolve a reference string to a commit within `core`.
pub(crate) fn resolve_ref(core: &RepoCore, reference: &str) -> FsResult<CommitId> {
    if !reference.is_empty() {
        // literal commit identifier
        let id = CommitId::from_ref(reference);
        if core.commits.read().contains_key(&id) {
            return Ok(id);
        }

        // branch head
        if let Some(head) = core.branches.lock().get(reference) {
            return Ok(head);
        }

        // positional: branch/N
        if let Some((name, index)) = reference.rsplit_once('/') {
            if let Ok(index) = index.parse::<usize>() {
                if let Some(id) = branch_chain(core, name).get(index) {
                    return Ok(id.clone());
                }
            }
        }
    }

    Err(FsError::CommitNotFound {
        repo: core.name.as_str().to_string(),
        reference: reference.to_string(),
    })
}

/// The commits of a branch, root first.
///
/// An explicit branch yields its head's ancestry; the default branch name
/// without an explicit pointer yields the repo's implicit history. Unknown
/// names yield an empty chain.
pub(crate) fn branch_chain(core: &RepoCore, branch: &str) -> Vec<CommitId> {
    let head = core.branches.lock().get(branch);
    match head {
        Some(head) => {
            let commits = core.commits.read();
            let mut chain = Vec::new();
            let mut cursor = Some(head);
            while let Some(id) = cursor {
                cursor = commits.get(&id).and_then(|cell| cell.parent.clone());
                chain.push(id);
            }
            chain.reverse();
            chain
        }
        None if branch == core.default_branch => core.history.lock().clone(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut set = BranchSet::new();
        let head = CommitId::generate();

        assert_eq!(set.get("master"), None);
        set.set("master", head.clone());
        assert_eq!(set.get("master"), Some(head));

        assert!(set.remove("master"));
        assert!(!set.remove("master"));
        assert_eq!(set.get("master"), None);
    }

    #[test]
    fn test_list_newest_first() {
        let mut set = BranchSet::new();
        let head = CommitId::generate();

        for name in ["branch1", "branch2", "branch3"] {
            set.set(name, head.clone());
        }

        let names: Vec<String> = set.list().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["branch3", "branch2", "branch1"]);

        // repointing bumps recency
        set.set("branch1", CommitId::generate());
        let names: Vec<String> = set.list().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["branch1", "branch3", "branch2"]);
    }

    #[test]
    fn test_heads() {
        let mut set = BranchSet::new();
        let a = CommitId::generate();
        let b = CommitId::generate();
        set.set("x", a.clone());
        set.set("y", b.clone());

        let mut heads = set.heads();
        heads.sort_by(|l, r| l.as_str().cmp(r.as_str()));
        let mut expected = vec![a, b];
        expected.sort_by(|l, r| l.as_str().cmp(r.as_str()));
        assert_eq!(heads, expected);
    }
}
