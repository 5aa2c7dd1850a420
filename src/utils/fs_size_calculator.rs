//! This module contains functions to calculate the size of different volume regions

use crate::fs::{ENTRY_SIZE, NODE_SIZE};

/// calculate needed entry table size
/// # Arguments
/// - `max_files`: the number of entry slots
/// # Return
/// the size of the entry table in bytes
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::entry_table_size;
/// assert_eq!(entry_table_size(5), 75);
/// ```
pub const fn entry_table_size(max_files: usize) -> u64 {
    (max_files * ENTRY_SIZE) as u64
}

/// calculate needed chain node table size
/// # Arguments
/// - `max_blocks`: the number of chain node slots
/// # Return
/// the size of the node table in bytes
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::node_table_size;
/// assert_eq!(node_table_size(10), 40);
/// ```
pub const fn node_table_size(max_blocks: usize) -> u64 {
    (max_blocks * NODE_SIZE) as u64
}

/// calculate the whole metadata region size,
/// the entry table immediately followed by the node table
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::metadata_size;
/// assert_eq!(metadata_size(5, 10), 75 + 40);
/// ```
pub const fn metadata_size(max_files: usize, max_blocks: usize) -> u64 {
    entry_table_size(max_files) + node_table_size(max_blocks)
}

/// calculate how many whole blocks the metadata region occupies,
/// which is also the index of the first data block
/// # Arguments
/// - `block_size`: must not be zero
/// # Example
/// ```
/// use blockfs::utils::fs_size_calculator::metadata_blocks;
/// assert_eq!(metadata_blocks(5, 10, 128), 1);
/// // 100 * 15 + 1000 * 4 = 5500 bytes, rounded up to 43 blocks
/// assert_eq!(metadata_blocks(100, 1000, 128), 43);
/// // exactly two blocks
/// assert_eq!(metadata_blocks(4, 1, 32), 2);
/// ```
pub const fn metadata_blocks(max_files: usize, max_blocks: usize, block_size: usize) -> u64 {
    metadata_size(max_files, max_blocks).div_ceil(block_size as u64)
}
