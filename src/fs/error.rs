//! Versioning-core error types
//!
//! All errors that can surface from registry operations are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages.
//!
//! Every variant carries enough to identify the offending name, identifier,
//! or path; no operation partially commits on failure.

use thiserror::Error;

use crate::block::BlockError;

/// the main error type for versioning operations
#[derive(Debug, Error)]
pub enum FsError {
    /// the repo name failed validation
    #[error("invalid repo name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// the repo already exists
    #[error("repo already exists: {0}")]
    AlreadyExists(String),

    /// the requested repo was not found
    #[error("repo not found: {0}")]
    RepoNotFound(String),

    /// the reference did not resolve to a commit
    #[error("commit not found: {repo}/{reference}")]
    CommitNotFound { repo: String, reference: String },

    /// the requested branch was not found
    #[error("branch not found: {repo}/{branch}")]
    BranchNotFound { repo: String, branch: String },

    /// the requested path is absent from the commit's tree
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// a provenance entry does not name an existing repo
    #[error("unknown provenance repo: {0}")]
    UnknownProvenance(String),

    /// the repo is listed in other repos' provenance and force was not given
    #[error("repo {repo} is provenance of: {dependents:?}")]
    ProvenanceConflict {
        repo: String,
        dependents: Vec<String>,
    },

    /// a mutating call addressed a commit that is no longer open
    #[error("commit is not open: {0}")]
    NotOpen(String),

    /// the commit (or its parent) has not been finished yet
    #[error("commit is not finished: {0}")]
    NotFinished(String),

    /// the merge would require a path to be both a file and a directory
    #[error("path conflict at {0}: file and directory")]
    PathConflict(String),

    /// a directory listing was requested on a file
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// file content was requested on a directory
    #[error("is a directory: {0}")]
    IsDirectory(String),

    /// error from the content store
    #[error("block store error: {0}")]
    Block(#[from] BlockError),

    /// I/O error while draining a caller's byte source
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FsError::RepoNotFound(_)
                | FsError::CommitNotFound { .. }
                | FsError::BranchNotFound { .. }
                | FsError::PathNotFound(_)
        )
    }

    /// check if this error is a conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FsError::AlreadyExists(_)
                | FsError::ProvenanceConflict { .. }
                | FsError::PathConflict(_)
        )
    }
}

/// result type alias for versioning operations
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = FsError::RepoNotFound("images".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = FsError::AlreadyExists("images".to_string());
        assert!(!conflict.is_not_found());
        assert!(conflict.is_conflict());

        let path = FsError::PathConflict("foo/bar".to_string());
        assert!(path.is_conflict());
    }
}
