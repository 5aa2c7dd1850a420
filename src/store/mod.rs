//! the flat byte region a volume lives in
//!
//! The engine never holds a file cursor; every access names its absolute
//! offset, so shared readers can use the store concurrently while a writer
//! needs exclusive access.
mod image_file;
mod memory;

pub use image_file::ImageFile;
pub use memory::MemoryRegion;

use std::io::{self, ErrorKind};

/// a fixed-length, randomly addressable byte region
pub trait BackingStore: Send + Sync {
    /// current total length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// grow or shrink the region, new bytes read as zero
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// fill `buf` with the bytes starting at `offset`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// overwrite the bytes starting at `offset` with `data`
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// make previous writes durable
    fn flush(&mut self) -> io::Result<()>;
}

/// locate `[offset, offset + n)` inside a region of `len` bytes
pub(crate) fn check_range(len: u64, offset: u64, n: usize) -> io::Result<std::ops::Range<usize>> {
    let end = offset
        .checked_add(n as u64)
        .filter(|end| *end <= len)
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("access of {n} bytes at offset {offset} is outside a region of {len} bytes"),
            )
        })?;
    Ok(offset as usize..end as usize)
}
