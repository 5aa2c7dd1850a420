//! free space tracking for data blocks, chain node slots and entry slots
use bitvec::prelude::*;
use log::warn;
use smallvec::SmallVec;

use crate::error::{Result, StorageError};

use super::{ChainNode, FileEntry, VolumeLayout};

pub type IndexList = SmallVec<[u16; 8]>;

/// slot of the live entry called `name`, compared byte for byte
pub fn find_file_slot(entries: &[Option<FileEntry>], name: &str) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.as_ref().is_some_and(|entry| entry.name == name))
}

pub fn find_free_entry_slot(entries: &[Option<FileEntry>]) -> Result<usize> {
    entries.iter().position(Option::is_none).ok_or_else(|| {
        StorageError::CapacityExceeded(format!("all {} entry slots are in use", entries.len()))
    })
}

/// blocks and node slots taken together for one write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservation {
    /// data blocks in the order content is written to them
    pub blocks: IndexList,
    /// node slots, the i-th one owns the i-th block
    pub nodes: IndexList,
}

impl Reservation {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// bitmaps of used data blocks and used node slots
///
/// Never persisted: both are derived from the node table by [Allocator::rebuild].
#[derive(Debug, Default, Clone)]
pub struct Allocator {
    data_bitmap: BitVec<u8, Lsb0>,
    node_bitmap: BitVec<u8, Lsb0>,
    first_data_block: usize,
}

impl Allocator {
    /// everything free except the metadata blocks
    pub fn new(layout: &VolumeLayout) -> Self {
        let mut allocator = Allocator {
            data_bitmap: bitvec![u8, Lsb0; 0; layout.block_count],
            node_bitmap: bitvec![u8, Lsb0; 0; layout.max_blocks],
            first_data_block: layout.first_data_block,
        };
        allocator.reserve_metadata_blocks();
        allocator
    }

    fn reserve_metadata_blocks(&mut self) {
        let reserved = self.first_data_block.min(self.data_bitmap.len());
        self.data_bitmap[..reserved].fill(true);
    }

    /// recompute both bitmaps from the live node table
    ///
    /// Fails when two nodes own the same block, or a node owns a metadata block.
    pub fn rebuild(&mut self, nodes: &[Option<ChainNode>]) -> Result<()> {
        self.data_bitmap.fill(false);
        self.node_bitmap.fill(false);
        self.reserve_metadata_blocks();

        for (slot, node) in nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            if slot < self.node_bitmap.len() {
                self.node_bitmap.set(slot, true);
            }
            let block = node.block;
            if block as usize >= self.data_bitmap.len() {
                warn!("node {slot} references block {block} past the volume end");
                continue;
            }
            if self.has_data_block(block) {
                return Err(StorageError::corrupted(format!(
                    "node {slot} owns block {block}, which is already in use"
                )));
            }
            self.data_bitmap.set(block as usize, true);
        }
        Ok(())
    }
}

/// for data block and node slot allocation
impl Allocator {
    pub fn has_data_block(&self, block: u16) -> bool {
        self.data_bitmap
            .get(block as usize)
            .as_deref()
            .copied()
            .unwrap_or(false)
    }

    pub fn free_data_blocks(&self) -> usize {
        self.data_bitmap.count_zeros()
    }

    pub fn free_nodes(&self) -> usize {
        self.node_bitmap.count_zeros()
    }

    /// the lowest `n` free data blocks, or nothing at all
    pub fn find_free_data_blocks(&self, n: usize) -> Result<IndexList> {
        take_free(&self.data_bitmap, n).ok_or_else(|| {
            StorageError::CapacityExceeded(format!(
                "{n} data blocks needed, {} free",
                self.free_data_blocks()
            ))
        })
    }

    /// the lowest `n` free node slots, or nothing at all
    pub fn find_free_node_slots(&self, n: usize) -> Result<IndexList> {
        take_free(&self.node_bitmap, n).ok_or_else(|| {
            StorageError::CapacityExceeded(format!(
                "{n} chain nodes needed, {} free",
                self.free_nodes()
            ))
        })
    }

    /// take `n` data blocks and `n` node slots together, or neither
    pub fn reserve(&mut self, n: usize) -> Result<Reservation> {
        let blocks = self.find_free_data_blocks(n)?;
        let nodes = self.find_free_node_slots(n)?;
        for (block, node) in blocks.iter().zip(&nodes) {
            self.data_bitmap.set(*block as usize, true);
            self.node_bitmap.set(*node as usize, true);
        }
        Ok(Reservation { blocks, nodes })
    }

    /// give back a node slot and the block it owned
    pub fn release(&mut self, node: u16, block: u16) {
        if let Some(mut used) = self.node_bitmap.get_mut(node as usize) {
            *used = false;
        }
        if (block as usize) >= self.first_data_block {
            if let Some(mut used) = self.data_bitmap.get_mut(block as usize) {
                *used = false;
            }
        }
    }

    pub fn release_reservation(&mut self, reservation: &Reservation) {
        for (block, node) in reservation.blocks.iter().zip(&reservation.nodes) {
            self.release(*node, *block);
        }
    }
}

fn take_free(bitmap: &BitSlice<u8, Lsb0>, n: usize) -> Option<IndexList> {
    let free: IndexList = bitmap.iter_zeros().take(n).map(|i| i as u16).collect();
    (free.len() == n).then_some(free)
}
