use crate::{
    error::{Result, StorageError},
    utils::traits::FixedRecord,
};

use super::{
    chain_node::{decode_index, encode_index},
    ENTRY_SIZE, MAX_NAME_LEN,
};

/// per-file metadata, one slot of the entry table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// logical length in bytes
    pub size: u16,
    /// first chain node, `None` for an empty file
    pub head: Option<u16>,
}

impl FileEntry {
    /// an empty file
    pub fn new(name: impl Into<String>) -> Self {
        FileEntry {
            name: name.into(),
            size: 0,
            head: None,
        }
    }

    /// no content, so no chain either
    pub fn is_empty(&self) -> bool {
        self.size == 0 || self.head.is_none()
    }

    /// check `name` can be stored in an entry
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidArgument(
                "file name must not be empty".into(),
            ));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(StorageError::InvalidArgument(format!(
                "file name {name:?} is longer than {MAX_NAME_LEN} bytes"
            )));
        }
        if name.contains('\0') {
            return Err(StorageError::InvalidArgument(format!(
                "file name {name:?} contains a NUL byte"
            )));
        }
        Ok(())
    }
}

/// layout: name (zero padded) | size: u16 | head: i16, big-endian
impl FixedRecord for FileEntry {
    const SIZE: usize = ENTRY_SIZE;

    fn encode_into(&self, buf: &mut [u8]) {
        buf.fill(0);
        let name = self.name.as_bytes();
        buf[..name.len()].copy_from_slice(name);
        buf[MAX_NAME_LEN..MAX_NAME_LEN + 2].copy_from_slice(&self.size.to_be_bytes());
        buf[MAX_NAME_LEN + 2..ENTRY_SIZE].copy_from_slice(&encode_index(self.head));
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        let raw_name = &buf[..MAX_NAME_LEN];
        let name_len = raw_name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(MAX_NAME_LEN);
        let name = std::str::from_utf8(&raw_name[..name_len])
            .map_err(|e| StorageError::corrupted(format!("entry name is not UTF-8: {e}")))?;
        if name.is_empty() {
            return Err(StorageError::corrupted("occupied entry without a name"));
        }
        let size = u16::from_be_bytes([buf[MAX_NAME_LEN], buf[MAX_NAME_LEN + 1]]);
        let head = decode_index([buf[MAX_NAME_LEN + 2], buf[MAX_NAME_LEN + 3]])?;
        if (size == 0) != head.is_none() {
            return Err(StorageError::corrupted(format!(
                "entry {name:?} has size {size} but head {head:?}"
            )));
        }
        Ok(FileEntry {
            name: name.to_owned(),
            size,
            head,
        })
    }
}
