//! core type-safe wrappers for the versioning layer
//!
//! Newtypes keep repo names, commit identifiers, branch names and file paths
//! from being mixed up, and centralize the validation and normalization rules
//! the rest of the crate relies on.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fs::error::{FsError, FsResult};

/// A validated repository name.
///
/// Valid names are non-empty and consist of ASCII letters, digits, and
/// underscores only. Everything else (slashes, dots, dashes, punctuation)
/// is rejected so names are safe to embed in references and URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoName(String);

impl RepoName {
    /// create a new RepoName, validating the input
    pub fn new(name: impl Into<String>) -> FsResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> FsResult<()> {
        if name.is_empty() {
            return Err(FsError::InvalidName {
                name: name.to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }
        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_')
        {
            return Err(FsError::InvalidName {
                name: name.to_string(),
                reason: format!("invalid character '{}'", c),
            });
        }
        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An opaque commit identifier.
///
/// Freshly started commits get a ULID, so identifiers are unique within a
/// process and sort roughly by creation time; callers treat them as opaque
/// tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(String);

impl CommitId {
    /// Generate a fresh identifier.
    pub(crate) fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// Wrap a caller-supplied reference string for table lookups.
    pub(crate) fn from_ref(reference: &str) -> Self {
        Self(reference.to_string())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a branch name, scoped to a repo
///
/// Branch names must be non-empty and must not contain `/`, which is
/// reserved for the positional reference form (`branch/2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchName(String);

impl BranchName {
    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> FsResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FsError::InvalidName {
                name,
                reason: "branch name cannot be empty".to_string(),
            });
        }
        if name.contains('/') {
            return Err(FsError::InvalidName {
                name,
                reason: "branch name cannot contain '/'".to_string(),
            });
        }
        Ok(Self(name))
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized slash-separated file path.
///
/// Leading, trailing, and repeated slashes are stripped, so `/bar`, `bar`,
/// and `bar/` all address the same node. The empty path is the tree root.
/// Individual segments are otherwise unrestricted; data file names in the
/// wild carry all sorts of punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilePath(String);

impl FilePath {
    /// normalize a raw path string
    pub fn new(raw: impl AsRef<str>) -> Self {
        let joined = raw
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// the tree root
    pub fn root() -> Self {
        Self(String::new())
    }

    /// true if this is the tree root
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the last path segment, or "" for the root
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// the containing directory, or None for the root
    pub fn parent(&self) -> Option<FilePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((dir, _)) => Some(FilePath(dir.to_string())),
            None => Some(FilePath::root()),
        }
    }

    /// proper ancestor directories, nearest the root first
    ///
    /// `a/b/c` yields `a` then `a/b`; the root itself is not included.
    pub fn ancestors(&self) -> Vec<FilePath> {
        let mut out = Vec::new();
        let mut end = 0;
        for (i, c) in self.0.char_indices() {
            if c == '/' {
                end = i;
                out.push(FilePath(self.0[..end].to_string()));
            }
        }
        out
    }

    /// true if `self` is strictly inside `dir`
    pub fn is_descendant_of(&self, dir: &FilePath) -> bool {
        if dir.is_root() {
            return !self.is_root();
        }
        self.0.len() > dir.0.len()
            && self.0.starts_with(dir.0.as_str())
            && self.0.as_bytes()[dir.0.len()] == b'/'
    }

    /// path of a child entry of this directory
    pub fn child(&self, name: &str) -> FilePath {
        if self.is_root() {
            FilePath(name.to_string())
        } else {
            FilePath(format!("{}/{}", self.0, name))
        }
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// whether a tree node is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Dir,
}

/// information about a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub created: DateTime<Utc>,
    /// sum of sizes of finished commits reachable from all branch heads
    pub size_bytes: u64,
    /// provenance repo names, in the order they were declared
    pub provenance: Vec<String>,
}

/// information about a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub repo: String,
    pub parent: Option<CommitId>,
    pub started: DateTime<Utc>,
    /// set once the commit is finished
    pub finished: Option<DateTime<Utc>>,
    /// total file bytes in the finished tree; 0 while open
    pub size_bytes: u64,
}

impl CommitInfo {
    /// true if the commit is still accepting writes
    pub fn is_open(&self) -> bool {
        self.finished.is_none()
    }
}

/// information about a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub head: CommitId,
}

/// information about a file or directory within a commit's tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub file_type: FileType,
    /// file size, or the recursive sum of descendant file sizes for a dir
    pub size_bytes: u64,
}
