use std::io;

use super::{check_range, BackingStore};

/// a volume kept entirely in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRegion {
    bytes: Vec<u8>,
}

impl MemoryRegion {
    /// a zero-filled region of `len` bytes
    pub fn new(len: usize) -> Self {
        MemoryRegion {
            bytes: vec![0u8; len],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        MemoryRegion { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl BackingStore for MemoryRegion {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "region too large"))?;
        self.bytes.resize(len, 0);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = check_range(self.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let range = check_range(self.len(), offset, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
