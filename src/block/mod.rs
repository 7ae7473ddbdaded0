//! content-addressed block storage
//!
//! The versioning core never holds raw file bytes: `put_file` splits content
//! into blocks, writes them here, and records [`BlockRef`]s in the commit's
//! diff log. The store is an external collaborator behind the [`BlockStore`]
//! trait; [`MemBlockStore`] is the in-process implementation used by tests
//! and single-node deployments.
//!
//! Blocks are addressed by the SHA-256 of their content, so writing the same
//! bytes twice yields the same reference and stores one copy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// errors from the block store
#[derive(Debug, Error)]
pub enum BlockError {
    /// the referenced block is not in the store
    #[error("unknown block: {0}")]
    UnknownBlock(BlockRef),

    /// backend-specific failure (network, disk, ...)
    #[error("block backend error: {0}")]
    Backend(String),
}

/// result type alias for block operations
pub type BlockResult<T> = Result<T, BlockError>;

/// Content address of a stored block.
///
/// References compare equal exactly when the underlying bytes are identical,
/// which is what makes diff logs cheap to record and dedup free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef(String);

impl BlockRef {
    /// compute the address for a chunk of content
    pub fn for_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// get the hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal contract the versioning core needs from physical storage.
///
/// `put_block` must be idempotent for identical content. `get_block` returns
/// the byte range `[offset, offset+size)`; a size of 0 reads to the end of
/// the block.
pub trait BlockStore: Send + Sync {
    /// Store a block, returning its content address.
    fn put_block(&self, bytes: &[u8]) -> BlockResult<BlockRef>;

    /// Read a range of a stored block.
    fn get_block(&self, block: &BlockRef, offset: u64, size: u64) -> BlockResult<Vec<u8>>;

    /// Size in bytes of a stored block.
    fn block_size(&self, block: &BlockRef) -> BlockResult<u64>;
}

/// In-memory content-addressed store.
///
/// Clone-free sharing: wrap it in an `Arc` and hand it to the registry.
pub struct MemBlockStore {
    blocks: RwLock<HashMap<BlockRef, Arc<Vec<u8>>>>,
}

impl MemBlockStore {
    /// create an empty store
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// number of distinct blocks held
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// true if no blocks are held
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl Default for MemBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemBlockStore {
    fn put_block(&self, bytes: &[u8]) -> BlockResult<BlockRef> {
        let block = BlockRef::for_content(bytes);
        let mut blocks = self.blocks.write();
        blocks
            .entry(block.clone())
            .or_insert_with(|| Arc::new(bytes.to_vec()));
        Ok(block)
    }

    fn get_block(&self, block: &BlockRef, offset: u64, size: u64) -> BlockResult<Vec<u8>> {
        let blocks = self.blocks.read();
        let bytes = blocks
            .get(block)
            .ok_or_else(|| BlockError::UnknownBlock(block.clone()))?;

        let len = bytes.len() as u64;
        let start = offset.min(len);
        let end = if size == 0 {
            len
        } else {
            (offset + size).min(len)
        };

        Ok(bytes[start as usize..end as usize].to_vec())
    }

    fn block_size(&self, block: &BlockRef) -> BlockResult<u64> {
        let blocks = self.blocks.read();
        let bytes = blocks
            .get(block)
            .ok_or_else(|| BlockError::UnknownBlock(block.clone()))?;
        Ok(bytes.len() as u64)
    }
}
