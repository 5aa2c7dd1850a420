//! what does our volume look like in the memory

use bitvec::prelude::*;
use log::{debug, error, info, warn};
use smallvec::SmallVec;

use crate::{
    error::{Result, StorageError},
    store::BackingStore,
};

use super::{
    allocator::{self, Allocator, IndexList},
    metadata::MetadataTables,
    ChainNode, FileEntry, Geometry, VolumeLayout, MAX_FILE_SIZE,
};

/// usage counters of a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeStats {
    /// blocks usable for file content
    pub total_blocks: usize,
    pub free_blocks: usize,
    pub free_nodes: usize,
    pub free_entries: usize,
    pub files: usize,
}

/// it has the following layout:
/// - entry table
/// - chain node table
/// - data blocks
///
/// The tables are the working copy, the allocator is derived from them.
#[derive(Debug)]
pub(crate) struct Volume<S> {
    layout: VolumeLayout,
    tables: MetadataTables,
    allocator: Allocator,
    store: S,
}

impl<S> Volume<S>
where
    S: BackingStore,
{
    /// restore a volume from `store`, sizing it to `geometry.total_size` first
    pub fn open(mut store: S, geometry: &Geometry) -> Result<Self> {
        geometry.validate()?;
        let layout = geometry.layout();
        if store.len() != geometry.total_size {
            debug!(
                "resizing backing store from {} to {} bytes",
                store.len(),
                geometry.total_size
            );
            store.set_len(geometry.total_size)?;
        }

        let mut tables = MetadataTables::deserialize_from(&store, &layout)?;
        check_tables(&tables, &layout)?;
        let orphans = drop_orphan_nodes(&mut tables);
        if orphans > 0 {
            warn!("reclaimed {orphans} chain nodes no file reaches");
        }
        let mut allocator = Allocator::new(&layout);
        allocator.rebuild(&tables.nodes)?;

        info!(
            "volume opened: {} entry slots, {} node slots, {} byte blocks, data starts at block {} of {}",
            layout.max_files,
            layout.max_blocks,
            layout.block_size,
            layout.first_data_block,
            layout.block_count
        );
        Ok(Volume {
            layout,
            tables,
            allocator,
            store,
        })
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.store.flush()?)
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn stats(&self) -> VolumeStats {
        VolumeStats {
            total_blocks: self.layout.data_blocks(),
            free_blocks: self.allocator.free_data_blocks(),
            free_nodes: self.allocator.free_nodes(),
            free_entries: self.tables.entries.iter().filter(|e| e.is_none()).count(),
            files: self.tables.live_entries().count(),
        }
    }
}

/// read only operations, safe under a shared lock
impl<S> Volume<S>
where
    S: BackingStore,
{
    pub fn list(&self) -> Vec<String> {
        self.tables
            .live_entries()
            .map(|(_, entry)| entry.name.clone())
            .collect()
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        if entry.is_empty() {
            return Ok(Vec::new());
        }

        let size = entry.size as usize;
        let mut buf = vec![0u8; size];
        let mut filled = 0;
        for (_, node) in self.tables.chain(entry.head) {
            if filled == size {
                break;
            }
            let n = (size - filled).min(self.layout.block_size);
            self.read_data_from_data_block(node.block, &mut buf[filled..filled + n])?;
            filled += n;
        }

        if filled < size {
            warn!("chain of {name:?} ends after {filled} of {size} bytes");
            buf.truncate(filled);
        }
        Ok(buf)
    }

    fn entry(&self, name: &str) -> Result<&FileEntry> {
        allocator::find_file_slot(&self.tables.entries, name)
            .and_then(|slot| self.tables.entries[slot].as_ref())
            .ok_or_else(|| StorageError::NotFound(name.to_owned()))
    }
}

/// mutating operations, callers hold the exclusive lock
impl<S> Volume<S>
where
    S: BackingStore,
{
    pub fn create_file(&mut self, name: &str) -> Result<()> {
        FileEntry::validate_name(name)?;
        if allocator::find_file_slot(&self.tables.entries, name).is_some() {
            return Err(StorageError::AlreadyExists(name.to_owned()));
        }
        let slot = allocator::find_free_entry_slot(&self.tables.entries)?;

        let snapshot = self.tables.clone();
        self.tables.entries[slot] = Some(FileEntry::new(name));
        self.commit(snapshot)?;
        debug!("created {name:?} in entry slot {slot}");
        Ok(())
    }

    /// replace the content of `name`
    ///
    /// New blocks are written and linked before the old chain is let go,
    /// a failure up to the metadata flush leaves the old content in place.
    pub fn write_file(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let slot = allocator::find_file_slot(&self.tables.entries, name)
            .ok_or_else(|| StorageError::NotFound(name.to_owned()))?;
        if content.len() > MAX_FILE_SIZE {
            return Err(StorageError::CapacityExceeded(format!(
                "{} bytes exceed the file size limit of {MAX_FILE_SIZE} bytes",
                content.len()
            )));
        }

        let needed = content.len().div_ceil(self.layout.block_size);
        let reservation = self.allocator.reserve(needed)?;
        if reservation.is_empty() {
            debug!("{name:?} becomes empty, no blocks reserved");
        } else if let Err(e) = self.fill_blocks(&reservation.blocks, content) {
            error!("writing {name:?} failed, releasing {needed} reserved blocks: {e}");
            self.allocator.release_reservation(&reservation);
            self.scrub(&reservation.blocks);
            return Err(e.into());
        }

        let snapshot = self.tables.clone();
        let old_chain: SmallVec<[(u16, ChainNode); 8]> = self
            .tables
            .entries[slot]
            .as_ref()
            .map(|entry| self.detach_chain(name, entry))
            .unwrap_or_default();
        for (node, _) in &old_chain {
            self.tables.nodes[*node as usize] = None;
        }
        for (i, (node, block)) in reservation.nodes.iter().zip(&reservation.blocks).enumerate() {
            let next = reservation.nodes.get(i + 1).copied();
            self.tables.nodes[*node as usize] = Some(ChainNode::new(*block, next));
        }
        if let Some(entry) = self.tables.entries[slot].as_mut() {
            entry.size = content.len() as u16;
            entry.head = reservation.nodes.first().copied();
        }

        if let Err(e) = self.commit(snapshot) {
            self.scrub(&reservation.blocks);
            return Err(e);
        }

        let old_blocks = self.release_chain(&old_chain);
        self.scrub(&old_blocks);
        debug!(
            "wrote {} bytes to {name:?} in {} blocks, released {} old blocks",
            content.len(),
            reservation.len(),
            old_blocks.len()
        );
        Ok(())
    }

    pub fn delete_file(&mut self, name: &str) -> Result<()> {
        let slot = allocator::find_file_slot(&self.tables.entries, name)
            .ok_or_else(|| StorageError::NotFound(name.to_owned()))?;

        let snapshot = self.tables.clone();
        let chain: SmallVec<[(u16, ChainNode); 8]> = self.tables.entries[slot]
            .as_ref()
            .map(|entry| self.detach_chain(name, entry))
            .unwrap_or_default();
        for (node, _) in &chain {
            self.tables.nodes[*node as usize] = None;
        }
        self.tables.entries[slot] = None;
        self.commit(snapshot)?;

        let blocks = self.release_chain(&chain);
        self.scrub(&blocks);
        debug!("deleted {name:?}, released {} blocks", blocks.len());
        Ok(())
    }

    /// persist the tables, or put `snapshot` back if that fails
    fn commit(&mut self, snapshot: MetadataTables) -> Result<()> {
        let Err(e) = self.tables.serialize_into(&mut self.store, &self.layout) else {
            return Ok(());
        };
        error!("persisting metadata failed, rolling back: {e}");
        self.tables = snapshot;
        if let Err(rebuild) = self.allocator.rebuild(&self.tables.nodes) {
            error!("rebuilding free space from previous metadata failed: {rebuild}");
        }
        if let Err(restore) = self.tables.serialize_into(&mut self.store, &self.layout) {
            error!("restoring previous metadata failed: {restore}");
        }
        Err(e)
    }

    /// the reachable part of the chain of `entry`
    ///
    /// Nodes past a break in the chain stay marked used until the next open.
    fn detach_chain(&self, name: &str, entry: &FileEntry) -> SmallVec<[(u16, ChainNode); 8]> {
        let chain: SmallVec<[(u16, ChainNode); 8]> = self.tables.chain(entry.head).collect();
        let expected = (entry.size as usize).div_ceil(self.layout.block_size);
        if chain.len() < expected {
            debug!(
                "chain of {name:?} reaches {} of {expected} nodes, the rest leaks until reopen",
                chain.len()
            );
        }
        chain
    }

    /// mark the nodes and blocks of a detached chain free
    fn release_chain(&mut self, chain: &[(u16, ChainNode)]) -> IndexList {
        chain
            .iter()
            .map(|(node, ChainNode { block, .. })| {
                self.allocator.release(*node, *block);
                *block
            })
            .collect()
    }

    /// zero blocks nothing references any more
    fn scrub(&mut self, blocks: &[u16]) {
        for block in blocks {
            if let Err(e) = self.zero_data_block(*block) {
                warn!("zeroing released block {block} failed: {e}");
            }
        }
    }
}

/// read and write data blocks in the backing store
impl<S> Volume<S>
where
    S: BackingStore,
{
    fn fill_blocks(&mut self, blocks: &[u16], content: &[u8]) -> std::io::Result<()> {
        for (block, chunk) in blocks.iter().zip(content.chunks(self.layout.block_size)) {
            self.write_data_to_data_block(*block, chunk)?;
        }
        Ok(())
    }

    /// write `data` at the start of `block`, zero padding the rest of it
    fn write_data_to_data_block(&mut self, block: u16, data: &[u8]) -> std::io::Result<()> {
        debug_assert!(self.layout.is_data_block(block));
        debug_assert!(data.len() <= self.layout.block_size);
        let offset = self.layout.data_block_seek_position(block);
        if data.len() == self.layout.block_size {
            return self.store.write_at(offset, data);
        }
        let mut padded = vec![0u8; self.layout.block_size];
        padded[..data.len()].copy_from_slice(data);
        self.store.write_at(offset, &padded)
    }

    fn read_data_from_data_block(&self, block: u16, buf: &mut [u8]) -> std::io::Result<()> {
        let offset = self.layout.data_block_seek_position(block);
        self.store.read_at(offset, buf)
    }

    fn zero_data_block(&mut self, block: u16) -> std::io::Result<()> {
        self.write_data_to_data_block(block, &[])
    }
}

/// every chain node must own a data block, never a metadata block,
/// and no node may be reachable from two files
fn check_tables(tables: &MetadataTables, layout: &VolumeLayout) -> Result<()> {
    for (slot, node) in tables.nodes.iter().enumerate() {
        if let Some(node) = node {
            if !layout.is_data_block(node.block) {
                return Err(StorageError::corrupted(format!(
                    "node {slot} owns block {} outside the data region",
                    node.block
                )));
            }
        }
    }

    let mut owned = bitvec![u8, Lsb0; 0; tables.nodes.len()];
    for (_, entry) in tables.live_entries() {
        for (slot, _) in tables.chain(entry.head) {
            if owned.replace(slot as usize, true) {
                return Err(StorageError::corrupted(format!(
                    "node {slot} of {:?} belongs to another file too",
                    entry.name
                )));
            }
        }
    }
    Ok(())
}

/// clear the nodes no live entry reaches, left behind by a broken chain
fn drop_orphan_nodes(tables: &mut MetadataTables) -> usize {
    let mut reachable = bitvec![u8, Lsb0; 0; tables.nodes.len()];
    for (_, entry) in tables.live_entries() {
        for (slot, _) in tables.chain(entry.head) {
            reachable.set(slot as usize, true);
        }
    }

    let mut dropped = 0;
    for (slot, node) in tables.nodes.iter_mut().enumerate() {
        if node.is_some() && !reachable[slot] {
            *node = None;
            dropped += 1;
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::DEFAULT_BLOCK_SIZE, store::MemoryRegion, utils::traits::FixedRecord};

    fn default_volume() -> Volume<MemoryRegion> {
        Volume::open(MemoryRegion::new(1280), &Geometry::default()).expect("open volume failed")
    }

    #[test]
    fn test_open_sizes_the_store() {
        let volume = Volume::open(MemoryRegion::new(0), &Geometry::default()).unwrap();
        assert_eq!(volume.into_store().as_bytes().len(), 1280);
    }

    #[test]
    fn test_open_rejects_invalid_geometry() {
        let result = Volume::open(MemoryRegion::new(1280), &Geometry::new(5, 10, 0, 1280));
        assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn test_open_rejects_node_in_metadata_region() {
        let mut bytes = vec![0u8; 1280];
        let mut node = [0u8; 4];
        ChainNode::new(0, None).encode_into(&mut node);
        // node slot 2
        bytes[75 + 8..75 + 12].copy_from_slice(&node);
        let result = Volume::open(MemoryRegion::from_bytes(bytes), &Geometry::default());
        match result {
            Err(StorageError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    fn open_tables(tables: &MetadataTables) -> Result<Volume<MemoryRegion>> {
        let geometry = Geometry::default();
        let mut store = MemoryRegion::new(1280);
        tables.serialize_into(&mut store, &geometry.layout()).unwrap();
        Volume::open(store, &geometry)
    }

    fn assert_corrupted(result: Result<Volume<MemoryRegion>>) {
        match result {
            Err(StorageError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_open_rejects_block_owned_twice() {
        let mut tables = MetadataTables::new(5, 10);
        tables.entries[0] = Some(FileEntry {
            name: "a".into(),
            size: 1,
            head: Some(0),
        });
        tables.entries[1] = Some(FileEntry {
            name: "b".into(),
            size: 1,
            head: Some(1),
        });
        tables.nodes[0] = Some(ChainNode::new(3, None));
        tables.nodes[1] = Some(ChainNode::new(3, None));
        assert_corrupted(open_tables(&tables));
    }

    #[test]
    fn test_open_rejects_node_shared_by_two_files() {
        let mut tables = MetadataTables::new(5, 10);
        tables.entries[0] = Some(FileEntry {
            name: "a".into(),
            size: 256,
            head: Some(0),
        });
        // b starts in the middle of a's chain
        tables.entries[1] = Some(FileEntry {
            name: "b".into(),
            size: 128,
            head: Some(1),
        });
        tables.nodes[0] = Some(ChainNode::new(2, Some(1)));
        tables.nodes[1] = Some(ChainNode::new(3, None));
        assert_corrupted(open_tables(&tables));
    }

    #[test]
    fn test_broken_chain_nodes_are_reclaimed_on_open() {
        let mut volume = default_volume();
        volume.create_file("a").unwrap();
        volume.write_file("a", &[1u8; 300]).unwrap();
        let head = volume.tables.entries[0].as_ref().unwrap().head.unwrap();
        volume.tables.nodes[head as usize].as_mut().unwrap().next = None;

        // only the head is reachable, the other two nodes stay in use
        volume.write_file("a", b"x").unwrap();
        let stats = volume.stats();
        assert_eq!(stats.free_nodes, 7);
        assert_eq!(stats.free_blocks, 6);

        let volume = Volume::open(volume.into_store(), &Geometry::default()).unwrap();
        let stats = volume.stats();
        assert_eq!(stats.free_nodes, 9);
        assert_eq!(stats.free_blocks, 8);
        assert_eq!(volume.read_file("a").unwrap(), b"x");
    }

    #[test]
    fn test_blocks_are_padded_and_zeroed() {
        let mut volume = default_volume();
        volume.create_file("a").unwrap();
        volume.write_file("a", &[7u8; 130]).unwrap();

        let bytes = volume.store.as_bytes();
        let block = DEFAULT_BLOCK_SIZE;
        assert!(bytes[block..2 * block].iter().all(|b| *b == 7));
        assert_eq!(&bytes[2 * block..2 * block + 3], &[7, 7, 0]);
        assert!(bytes[2 * block + 2..3 * block].iter().all(|b| *b == 0));

        volume.write_file("a", b"xy").unwrap();
        let bytes = volume.store.as_bytes();
        // new content went to fresh blocks, old ones were zeroed
        assert_eq!(&bytes[3 * block..3 * block + 2], b"xy");
        assert!(bytes[block..3 * block].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_read_truncates_broken_chain() {
        let mut volume = default_volume();
        volume.create_file("a").unwrap();
        volume.write_file("a", &[1u8; 300]).unwrap();
        let head = volume.tables.entries[0].as_ref().unwrap().head.unwrap();
        let second = volume.tables.nodes[head as usize].unwrap().next.unwrap();
        volume.tables.nodes[second as usize] = None;

        let content = volume.read_file("a").unwrap();
        assert_eq!(content, vec![1u8; DEFAULT_BLOCK_SIZE]);
    }

    #[test]
    fn test_stats() {
        let mut volume = default_volume();
        volume.create_file("a").unwrap();
        volume.write_file("a", &[1u8; 300]).unwrap();
        assert_eq!(
            volume.stats(),
            VolumeStats {
                total_blocks: 9,
                free_blocks: 6,
                free_nodes: 7,
                free_entries: 4,
                files: 1,
            }
        );
    }
}
