//! the entry table and the node table, and how they are stored
use bitvec::prelude::*;

use crate::{error::Result, store::BackingStore, utils::traits::FixedRecord};

use super::{ChainNode, FileEntry, VolumeLayout};

/// in-memory copy of both metadata tables, slot by slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTables {
    pub entries: Vec<Option<FileEntry>>,
    pub nodes: Vec<Option<ChainNode>>,
}

/// for serialize and deserialize
impl MetadataTables {
    /// tables of a freshly formatted volume
    pub fn new(max_files: usize, max_blocks: usize) -> Self {
        MetadataTables {
            entries: vec![None; max_files],
            nodes: vec![None; max_blocks],
        }
    }

    /// load every slot of both tables from `store`
    pub fn deserialize_from<S>(store: &S, layout: &VolumeLayout) -> Result<Self>
    where
        S: BackingStore + ?Sized,
    {
        let mut buf = vec![0u8; layout.metadata_len as usize];
        store.read_at(VolumeLayout::ENTRY_TABLE_OFFSET, &mut buf)?;
        let (entry_bytes, node_bytes) = buf.split_at(layout.node_table_offset as usize);

        Ok(MetadataTables {
            entries: FileEntry::deserialize_table(entry_bytes)?,
            nodes: ChainNode::deserialize_table(node_bytes)?,
        })
    }

    /// write every slot of both tables back to `store`, free slots as zeros
    pub fn serialize_into<S>(&self, store: &mut S, layout: &VolumeLayout) -> Result<()>
    where
        S: BackingStore + ?Sized,
    {
        let mut buf = FileEntry::serialize_table(&self.entries);
        buf.extend_from_slice(&ChainNode::serialize_table(&self.nodes));
        debug_assert_eq!(buf.len() as u64, layout.metadata_len);
        store.write_at(VolumeLayout::ENTRY_TABLE_OFFSET, &buf)?;
        store.flush()?;
        Ok(())
    }
}

impl MetadataTables {
    /// live entries with their slot numbers, in slot order
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot, entry)))
    }

    /// walk a chain from `head`
    pub fn chain(&self, head: Option<u16>) -> Chain<'_> {
        Chain {
            nodes: &self.nodes,
            next: head,
            visited: bitvec![u8, Lsb0; 0; self.nodes.len()],
        }
    }
}

/// iterator over `(node slot, node)` pairs of one chain
///
/// Stops early at a missing or out-of-range slot and at a slot seen before.
#[derive(Debug)]
pub struct Chain<'a> {
    nodes: &'a [Option<ChainNode>],
    next: Option<u16>,
    visited: BitVec<u8, Lsb0>,
}

impl Iterator for Chain<'_> {
    type Item = (u16, ChainNode);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next.take()?;
        let slot = index as usize;
        let node = (*self.nodes.get(slot)?)?;
        if self.visited.replace(slot, true) {
            return None;
        }
        self.next = node.next;
        Some((index, node))
    }
}
