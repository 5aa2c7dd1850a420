use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    path::Path,
};

use log::debug;
use memmap2::MmapMut;

use super::{check_range, BackingStore};

/// an image file on the host, mapped into memory for read and write
#[derive(Debug)]
pub struct ImageFile {
    file: File,
    mmap: MmapMut,
}

impl ImageFile {
    /// open the image at `image_path`, creating it if needed,
    /// and size it to exactly `total_size` bytes
    pub fn open<P>(image_path: P, total_size: u64) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(image_path.as_ref())?;
        file.set_len(total_size)?;
        debug!(
            "opened image {:?} with {} bytes",
            image_path.as_ref(),
            total_size
        );
        Self::map(file)
    }

    /// create a brand new image, fails if `image_path` already exists
    pub fn create_new<P>(image_path: P, total_size: u64) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(image_path.as_ref())?;
        // all bytes of a freshly extended file read as zero
        file.set_len(total_size)?;
        Self::map(file)
    }

    fn map(file: File) -> io::Result<Self> {
        let mmap = Self::map_file(&file)?;
        Ok(ImageFile { file, mmap })
    }

    fn map_file(file: &File) -> io::Result<MmapMut> {
        if file.metadata()?.len() == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "can't map an empty image file",
            ));
        }
        // Safety
        // the mapping is owned by this struct together with the file handle,
        // and is only touched through `&self`/`&mut self`.
        // It fails when the file is not opened for both read and write.
        unsafe { MmapMut::map_mut(file) }
    }
}

impl BackingStore for ImageFile {
    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        if len == self.len() {
            return Ok(());
        }
        self.mmap.flush()?;
        self.file.set_len(len)?;
        self.mmap = Self::map_file(&self.file)?;
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = check_range(self.len(), offset, buf.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let range = check_range(self.len(), offset, data.len())?;
        self.mmap[range].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mmap.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_image(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        if path.exists() {
            std::fs::remove_file(&path).expect("remove stale image failed");
        }
        path
    }

    #[test]
    fn test_open_sizes_and_persists() {
        let path = scratch_image("blockfs_image_file_open.img");
        {
            let mut image = ImageFile::open(&path, 512).expect("open image failed");
            assert_eq!(image.len(), 512);
            image.write_at(500, b"tail").unwrap();
            image.flush().unwrap();
        }
        let image = ImageFile::open(&path, 512).expect("reopen image failed");
        let mut buf = [0u8; 4];
        image.read_at(500, &mut buf).unwrap();
        assert_eq!(&buf, b"tail");
        let mut head = [0xffu8; 8];
        image.read_at(0, &mut head).unwrap();
        assert_eq!(head, [0u8; 8]);

        std::fs::remove_file(&path).expect("test is passed,but remove temp file failed!")
    }

    #[test]
    fn test_create_new_refuses_existing_file() {
        let path = scratch_image("blockfs_image_file_create_new.img");
        ImageFile::create_new(&path, 256).expect("create image failed");
        let err = ImageFile::create_new(&path, 256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        std::fs::remove_file(&path).expect("test is passed,but remove temp file failed!")
    }

    #[test]
    fn test_set_len_and_bounds() {
        let path = scratch_image("blockfs_image_file_set_len.img");
        let mut image = ImageFile::create_new(&path, 128).unwrap();
        assert!(image.write_at(126, b"abc").is_err());
        image.set_len(256).unwrap();
        assert_eq!(image.len(), 256);
        image.write_at(126, b"abc").unwrap();
        let mut buf = [0u8; 3];
        image.read_at(126, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        std::fs::remove_file(&path).expect("test is passed,but remove temp file failed!")
    }
}
