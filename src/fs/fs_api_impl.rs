use std::{
    path::Path,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, info, warn};

use crate::{
    error::Result,
    store::{BackingStore, ImageFile},
};

use super::{fs_layout::Volume, FileService, Geometry, VolumeLayout, VolumeStats};

/// a volume shared by any number of request handlers
///
/// `read`, `list` and `stats` take the lock shared, `create`, `write` and
/// `delete` take it exclusively and persist the metadata before releasing it.
#[derive(Debug)]
pub struct StorageEngine<S> {
    volume: RwLock<Volume<S>>,
}

impl StorageEngine<ImageFile> {
    /// open the image file at `image_path`, creating and sizing it if needed
    pub fn open_image<P>(image_path: P, geometry: Geometry) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        geometry.validate()?;
        let image = ImageFile::open(image_path.as_ref(), geometry.total_size)?;
        info!("mounting image {:?}", image_path.as_ref());
        Self::open(image, geometry)
    }
}

impl<S> StorageEngine<S>
where
    S: BackingStore,
{
    /// load the metadata in `store` and derive the free space from it
    pub fn open(store: S, geometry: Geometry) -> Result<Self> {
        let volume = Volume::open(store, &geometry)?;
        Ok(StorageEngine {
            volume: RwLock::new(volume),
        })
    }

    pub fn layout(&self) -> VolumeLayout {
        *self.shared().layout()
    }

    /// flush and hand the backing store back
    pub fn close(self) -> Result<S> {
        let mut volume = self
            .volume
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        volume.flush()?;
        Ok(volume.into_store())
    }

    fn shared(&self) -> RwLockReadGuard<'_, Volume<S>> {
        self.volume.read().unwrap_or_else(|poisoned| {
            warn!("volume lock poisoned by a panicked writer, continuing");
            poisoned.into_inner()
        })
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, Volume<S>> {
        self.volume.write().unwrap_or_else(|poisoned| {
            warn!("volume lock poisoned by a panicked writer, continuing");
            poisoned.into_inner()
        })
    }
}

impl<S> FileService for StorageEngine<S>
where
    S: BackingStore,
{
    fn create(&self, name: &str) -> Result<()> {
        info!("create() called with name: {name:?}");
        self.exclusive().create_file(name)
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<()> {
        info!(
            "write() called with name: {name:?}, {} bytes",
            content.len()
        );
        self.exclusive().write_file(name, content)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        info!("read() called with name: {name:?}");
        self.shared().read_file(name)
    }

    fn delete(&self, name: &str) -> Result<()> {
        info!("delete() called with name: {name:?}");
        self.exclusive().delete_file(name)
    }

    fn list(&self) -> Vec<String> {
        let names = self.shared().list();
        debug!("list() found {} files", names.len());
        names
    }

    fn stats(&self) -> VolumeStats {
        self.shared().stats()
    }
}
