//! capacity constants of a volume and the byte layout derived from them
use crate::{
    error::{Result, StorageError},
    utils::fs_size_calculator,
};

use super::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_BLOCKS, DEFAULT_MAX_FILES, MAX_INDEX_COUNT};

/// fixed for the lifetime of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// number of entry slots
    pub max_files: usize,
    /// number of chain node slots
    pub max_blocks: usize,
    /// data block size in bytes
    pub block_size: usize,
    /// length of the backing store in bytes
    pub total_size: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            max_files: DEFAULT_MAX_FILES,
            max_blocks: DEFAULT_MAX_BLOCKS,
            block_size: DEFAULT_BLOCK_SIZE,
            total_size: (DEFAULT_MAX_BLOCKS * DEFAULT_BLOCK_SIZE) as u64,
        }
    }
}

impl Geometry {
    pub fn new(max_files: usize, max_blocks: usize, block_size: usize, total_size: u64) -> Self {
        Geometry {
            max_files,
            max_blocks,
            block_size,
            total_size,
        }
    }

    /// the smallest store that holds the metadata and one data block
    pub fn min_total_size(&self) -> u64 {
        let block_size = self.block_size.max(1) as u64;
        (fs_size_calculator::metadata_blocks(self.max_files, self.max_blocks, block_size as usize)
            + 1)
            * block_size
    }

    /// check the constants describe a volume that can be laid out
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(invalid("block size must not be zero"));
        }
        if self.max_files == 0 {
            return Err(invalid("a volume needs at least one entry slot"));
        }
        if self.max_blocks == 0 || self.max_blocks > MAX_INDEX_COUNT {
            return Err(invalid(format!(
                "node slot count must be in 1..={MAX_INDEX_COUNT}, not {}",
                self.max_blocks
            )));
        }
        if usize::try_from(self.total_size).is_err() {
            return Err(invalid(format!(
                "total size {} is not addressable",
                self.total_size
            )));
        }
        let block_count = self.total_size / self.block_size as u64;
        if block_count > MAX_INDEX_COUNT as u64 {
            return Err(invalid(format!(
                "{block_count} blocks don't fit 16-bit block indices"
            )));
        }
        if self.total_size < self.min_total_size() {
            return Err(invalid(format!(
                "total size must be at least {} bytes to hold the metadata and one data block",
                self.min_total_size()
            )));
        }
        Ok(())
    }

    /// compute the region boundaries, `block_size` must not be zero
    pub fn layout(&self) -> VolumeLayout {
        VolumeLayout::compute(self)
    }
}

fn invalid(msg: impl Into<String>) -> StorageError {
    StorageError::InvalidArgument(msg.into())
}

/// where every region of a volume starts
/// - entry table at byte 0
/// - node table right after it
/// - data blocks from `first_data_block` on, metadata rounded up to whole blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLayout {
    pub max_files: usize,
    pub max_blocks: usize,
    pub block_size: usize,
    pub node_table_offset: u64,
    pub metadata_len: u64,
    pub first_data_block: usize,
    /// physical blocks in the store, metadata blocks included
    pub block_count: usize,
}

impl VolumeLayout {
    pub const ENTRY_TABLE_OFFSET: u64 = 0;

    pub fn compute(geometry: &Geometry) -> Self {
        let Geometry {
            max_files,
            max_blocks,
            block_size,
            total_size,
        } = *geometry;
        VolumeLayout {
            max_files,
            max_blocks,
            block_size,
            node_table_offset: fs_size_calculator::entry_table_size(max_files),
            metadata_len: fs_size_calculator::metadata_size(max_files, max_blocks),
            first_data_block: fs_size_calculator::metadata_blocks(max_files, max_blocks, block_size)
                as usize,
            block_count: (total_size / block_size as u64) as usize,
        }
    }

    #[inline]
    pub fn data_block_seek_position(&self, block: u16) -> u64 {
        block as u64 * self.block_size as u64
    }

    /// whether `block` lies in the data region
    #[inline]
    pub fn is_data_block(&self, block: u16) -> bool {
        (self.first_data_block..self.block_count).contains(&(block as usize))
    }

    /// number of blocks usable for file content
    pub fn data_blocks(&self) -> usize {
        self.block_count.saturating_sub(self.first_data_block)
    }
}
