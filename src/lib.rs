//! datafs - a version-controlled file system for data
//!
//! This crate is the metadata and versioning core of a content-addressed,
//! git-like file system: repositories with provenance, an append-only commit
//! history per repository, mutable branch pointers, and hierarchical file
//! trees built copy-on-write against a parent snapshot.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use datafs::block::MemBlockStore;
//! use datafs::fs::Registry;
//!
//! let fs = Registry::new(Arc::new(MemBlockStore::new()));
//! fs.create_repo("logs", &[]).unwrap();
//! let commit = fs.start_commit("logs", "").unwrap();
//! fs.put_file("logs", commit.as_str(), "day1/events", &b"hello\n"[..]).unwrap();
//! fs.finish_commit("logs", commit.as_str()).unwrap();
//! let bytes = fs.get_file("logs", commit.as_str(), "day1/events", 0, 0).unwrap();
//! assert_eq!(bytes, b"hello\n");
//! ```

pub mod block;
pub mod config;
pub mod fs;
