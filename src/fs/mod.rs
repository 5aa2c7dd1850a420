//! our block-based volume
pub mod allocator;
pub mod chain_node;
pub mod entry;
mod fs_api_impl;
mod fs_layout;
pub mod geometry;
pub mod metadata;

pub use chain_node::ChainNode;
pub use entry::FileEntry;
pub use fs_api_impl::StorageEngine;
pub use fs_layout::VolumeStats;
pub use geometry::{Geometry, VolumeLayout};

use crate::error::Result;

/// longest file name in bytes, once UTF-8 encoded
pub const MAX_NAME_LEN: usize = 11;
/// name, 16-bit size and 16-bit head node
pub const ENTRY_SIZE: usize = MAX_NAME_LEN + 2 + 2;
/// 16-bit block index and 16-bit next node
pub const NODE_SIZE: usize = 4;
/// the size field is 16 bits wide
pub const MAX_FILE_SIZE: usize = u16::MAX as usize;
/// block and node indices are 16-bit signed, -1 is taken by "none"
pub const MAX_INDEX_COUNT: usize = i16::MAX as usize;

pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_MAX_BLOCKS: usize = 10;
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// the operations a request handler may invoke on a volume
///
/// Every method may be called concurrently from many threads.
pub trait FileService: Send + Sync {
    /// create an empty file
    fn create(&self, name: &str) -> Result<()>;

    /// replace the whole content of an existing file
    fn write(&self, name: &str, content: &[u8]) -> Result<()>;

    /// read the whole content of a file
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    fn delete(&self, name: &str) -> Result<()>;

    /// names of all files, in entry table order
    fn list(&self) -> Vec<String>;

    /// usage counters of the volume
    fn stats(&self) -> VolumeStats;
}
