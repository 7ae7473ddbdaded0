//! runtime configuration for a registry instance
//!
//! A [`Config`] is injected at construction time so independent registries
//! can run with different settings in one process (and in tests).

/// Tunables for a [`Registry`](crate::fs::Registry).
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the implicit default branch. Every started commit is appended
    /// to this branch's history whether or not the name is ever set
    /// explicitly.
    pub default_branch: String,

    /// Maximum bytes per content block written by `put_file`. Larger file
    /// content is split across multiple blocks.
    pub block_size: usize,
}

impl Config {
    /// the default branch name
    pub const DEFAULT_BRANCH: &'static str = "master";

    /// the default block size (8 MiB)
    pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024 * 1024;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_branch: Self::DEFAULT_BRANCH.to_string(),
            block_size: Self::DEFAULT_BLOCK_SIZE,
        }
    }
}
