//! the versioning core of datafs
//!
//! This module owns everything above raw bytes: repositories and their
//! provenance, commit history, branches, and file trees. Physical storage
//! stays behind the `block` module's `BlockStore` trait and a transport
//! layer is expected to sit on top of [`Registry`]; neither is implemented
//! here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Registry                            │
//! │   (repo table, provenance graph, the full operation set)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼ one per repo
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         RepoCore                            │
//! └─────────────────────────────────────────────────────────────┘
//!        │                 │                  │            │
//!        ▼                 ▼                  ▼            ▼
//!  ┌───────────┐    ┌─────────────┐    ┌───────────┐  ┌─────────┐
//!  │  commit   │    │    refs     │    │   tree    │  │  watch  │
//!  │ (history) │    │ (branches)  │    │  (files)  │  │ (subs)  │
//!  └───────────┘    └─────────────┘    └───────────┘  └─────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use datafs::fs::Registry;
//!
//! let fs = Registry::new(store);
//! fs.create_repo("images", &[])?;
//! let commit = fs.start_commit("images", "")?;
//! fs.put_file("images", commit.as_str(), "cat.png", reader)?;
//! fs.finish_commit("images", commit.as_str())?;
//!
//! // watch a branch for new finished commits
//! let stream = fs.subscribe_commit("images", "master", "")?;
//! ```

mod commit;
mod error;
mod refs;
mod registry;
mod repo;
mod subscribe;
mod tree;
mod types;

// Re-export public API
pub use error::{FsError, FsResult};
pub use registry::Registry;
pub use subscribe::{CommitStream, StreamCloser};
pub use types::{
    BranchInfo, BranchName, CommitId, CommitInfo, FileInfo, FilePath, FileType, RepoInfo, RepoName,
};
