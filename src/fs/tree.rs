//! file tree engine
//!
//! An open commit accumulates an ordered diff log of appends, tombstones,
//! and directory creations. Finishing the commit replays that log over a
//! copy-on-write view of the parent's snapshot to produce an immutable
//! [`FileTree`]. The merge rules:
//!
//! - appends to one path concatenate in log order, on top of the parent's
//!   content when the parent has a file there
//! - a tombstone suppresses ancestor-snapshot content only; it never removes
//!   appends recorded by the same commit (a commit cannot remove what it
//!   itself just added)
//! - a tombstone on a directory covers every descendant in the snapshot
//! - any path that would end up both a file and a directory fails the merge
//!   with `PathConflict`, leaving the log intact for a retry

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::block::{BlockRef, BlockStore};
use crate::fs::error::{FsError, FsResult};
use crate::fs::types::{FileInfo, FilePath, FileType};

/// one operation recorded by an open commit
#[derive(Debug, Clone)]
pub(crate) enum DiffOp {
    /// append content blocks to the file at the path
    Append { blocks: Vec<BlockRef>, size: u64 },
    /// tombstone the path (and, for a directory, its descendants) relative
    /// to the parent snapshot
    Delete,
    /// ensure a directory exists at the path
    MakeDir,
}

/// a single diff log entry
#[derive(Debug, Clone)]
pub(crate) struct DiffEntry {
    pub path: FilePath,
    pub op: DiffOp,
}

/// Append-only log of writes against an open commit.
///
/// The owning commit cell serializes appends; entry order is the finish
/// order used by the merge.
#[derive(Debug, Default)]
pub(crate) struct DiffLog {
    entries: Vec<DiffEntry>,
}

impl DiffLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_file(&mut self, path: FilePath, blocks: Vec<BlockRef>, size: u64) {
        self.entries.push(DiffEntry {
            path,
            op: DiffOp::Append { blocks, size },
        });
    }

    pub fn delete(&mut self, path: FilePath) {
        self.entries.push(DiffEntry {
            path,
            op: DiffOp::Delete,
        });
    }

    pub fn make_dir(&mut self, path: FilePath) {
        self.entries.push(DiffEntry {
            path,
            op: DiffOp::MakeDir,
        });
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }
}

/// a node in a finished tree
#[derive(Debug, Clone)]
pub(crate) enum FileNode {
    File { blocks: Vec<BlockRef>, size: u64 },
    Dir,
}

/// Immutable snapshot of a finished commit's file hierarchy.
///
/// Nodes are keyed by normalized path and shared (`Arc`) with ancestor
/// snapshots; finishing a commit clones the parent's index, not its
/// payloads.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileTree {
    nodes: BTreeMap<String, Arc<FileNode>>,
}

impl FileTree {
    pub fn empty() -> Self {
        Self::default()
    }

    fn node(&self, path: &FilePath) -> Option<&Arc<FileNode>> {
        self.nodes.get(path.as_str())
    }

    /// total file bytes in the snapshot
    pub fn total_size(&self) -> u64 {
        self.nodes
            .values()
            .map(|node| match **node {
                FileNode::File { size, .. } => size,
                FileNode::Dir => 0,
            })
            .sum()
    }

    /// recursive sum of file sizes under a directory
    fn size_under(&self, dir: &FilePath) -> u64 {
        if dir.is_root() {
            return self.total_size();
        }
        let prefix = format!("{}/", dir.as_str());
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, node)| match **node {
                FileNode::File { size, .. } => size,
                FileNode::Dir => 0,
            })
            .sum()
    }

    /// Size and type of the node at `path`.
    ///
    /// The root is always present as a directory, even in an empty tree.
    pub fn inspect(&self, path: &FilePath) -> FsResult<FileInfo> {
        if path.is_root() {
            return Ok(FileInfo {
                path: String::new(),
                file_type: FileType::Dir,
                size_bytes: self.total_size(),
            });
        }
        match self.node(path) {
            Some(node) => match **node {
                FileNode::File { size, .. } => Ok(FileInfo {
                    path: path.as_str().to_string(),
                    file_type: FileType::File,
                    size_bytes: size,
                }),
                FileNode::Dir => Ok(FileInfo {
                    path: path.as_str().to_string(),
                    file_type: FileType::Dir,
                    size_bytes: self.size_under(path),
                }),
            },
            None => Err(FsError::PathNotFound(path.as_str().to_string())),
        }
    }

    /// Immediate children of a directory (non-recursive).
    pub fn list(&self, path: &FilePath) -> FsResult<Vec<FileInfo>> {
        if !path.is_root() {
            match self.node(path) {
                Some(node) if matches!(**node, FileNode::File { .. }) => {
                    return Err(FsError::NotADirectory(path.as_str().to_string()))
                }
                Some(_) => {}
                None => return Err(FsError::PathNotFound(path.as_str().to_string())),
            }
        }

        let prefix = if path.is_root() {
            String::new()
        } else {
            format!("{}/", path.as_str())
        };

        let mut out = Vec::new();
        for (key, _) in self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
        {
            // immediate children only
            if key[prefix.len()..].contains('/') {
                continue;
            }
            out.push(self.inspect(&FilePath::new(key))?);
        }
        Ok(out)
    }

    /// Read `[offset, offset+size)` of a file's concatenated content.
    ///
    /// A size of 0 reads to the end.
    pub fn read(
        &self,
        store: &dyn BlockStore,
        path: &FilePath,
        offset: u64,
        size: u64,
    ) -> FsResult<Vec<u8>> {
        if path.is_root() {
            return Err(FsError::IsDirectory(String::new()));
        }
        let node = self
            .node(path)
            .ok_or_else(|| FsError::PathNotFound(path.as_str().to_string()))?;
        let (blocks, file_size) = match **node {
            FileNode::File {
                ref blocks,
                size: file_size,
            } => (blocks, file_size),
            FileNode::Dir => return Err(FsError::IsDirectory(path.as_str().to_string())),
        };

        let start = offset.min(file_size);
        let end = if size == 0 {
            file_size
        } else {
            (offset + size).min(file_size)
        };

        let mut out = Vec::with_capacity((end - start) as usize);
        let mut cursor = 0u64;
        for block in blocks {
            let block_len = store.block_size(block)?;
            let block_start = cursor;
            let block_end = cursor + block_len;
            cursor = block_end;

            if block_end <= start {
                continue;
            }
            if block_start >= end {
                break;
            }

            let take_from = start.saturating_sub(block_start);
            let take_until = (end - block_start).min(block_len);
            out.extend(store.get_block(block, take_from, take_until - take_from)?);
        }
        Ok(out)
    }
}

/// Replay a diff log over the parent snapshot, producing the finished tree.
pub(crate) fn merge(parent: Option<&FileTree>, log: &DiffLog) -> FsResult<FileTree> {
    let mut nodes = parent.map(|tree| tree.nodes.clone()).unwrap_or_default();

    // tombstones first: they only ever suppress inherited content
    for entry in log.entries() {
        if matches!(entry.op, DiffOp::Delete) {
            remove_subtree(&mut nodes, &entry.path);
        }
    }

    for entry in log.entries() {
        match &entry.op {
            DiffOp::Delete => {}
            DiffOp::MakeDir => {
                ensure_dirs(&mut nodes, &entry.path)?;
                put_dir(&mut nodes, &entry.path)?;
            }
            DiffOp::Append { blocks, size } => {
                ensure_dirs(&mut nodes, &entry.path)?;
                append_blocks(&mut nodes, &entry.path, blocks, *size)?;
            }
        }
    }

    Ok(FileTree { nodes })
}

fn remove_subtree(nodes: &mut BTreeMap<String, Arc<FileNode>>, path: &FilePath) {
    if path.is_root() {
        nodes.clear();
        return;
    }
    nodes.remove(path.as_str());
    let prefix = format!("{}/", path.as_str());
    let descendants: Vec<String> = nodes
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .map(|(key, _)| key.clone())
        .collect();
    for key in descendants {
        nodes.remove(&key);
    }
}

/// Materialize every ancestor directory of `path`.
fn ensure_dirs(nodes: &mut BTreeMap<String, Arc<FileNode>>, path: &FilePath) -> FsResult<()> {
    for dir in path.ancestors() {
        put_dir(nodes, &dir)?;
    }
    Ok(())
}

fn put_dir(nodes: &mut BTreeMap<String, Arc<FileNode>>, path: &FilePath) -> FsResult<()> {
    if path.is_root() {
        return Ok(());
    }
    match nodes.get(path.as_str()) {
        Some(node) if matches!(**node, FileNode::File { .. }) => {
            Err(FsError::PathConflict(path.as_str().to_string()))
        }
        Some(_) => Ok(()),
        None => {
            nodes.insert(path.as_str().to_string(), Arc::new(FileNode::Dir));
            Ok(())
        }
    }
}

fn append_blocks(
    nodes: &mut BTreeMap<String, Arc<FileNode>>,
    path: &FilePath,
    new_blocks: &[BlockRef],
    new_size: u64,
) -> FsResult<()> {
    if path.is_root() {
        return Err(FsError::PathConflict(String::new()));
    }
    match nodes.get_mut(path.as_str()) {
        Some(node) => match Arc::make_mut(node) {
            FileNode::File { blocks, size } => {
                blocks.extend_from_slice(new_blocks);
                *size += new_size;
                Ok(())
            }
            FileNode::Dir => Err(FsError::PathConflict(path.as_str().to_string())),
        },
        None => {
            nodes.insert(
                path.as_str().to_string(),
                Arc::new(FileNode::File {
                    blocks: new_blocks.to_vec(),
                    size: new_size,
                }),
            );
            Ok(())
        }
    }
}
