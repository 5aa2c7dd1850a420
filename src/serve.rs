//! open a volume image and serve it over TCP
use std::{path::Path, sync::Arc};

use log::info;

use crate::{
    fs::{FileService, Geometry, StorageEngine},
    server,
};

/// open (or create) the image at `image_path` and serve it on `listen_addr`
///
/// This blocks for as long as the listener runs.
pub fn serve_image<P>(image_path: P, geometry: Geometry, listen_addr: &str) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let engine = StorageEngine::open_image(image_path.as_ref(), geometry)?;
    info!(
        "volume {:?} ready with {} files",
        image_path.as_ref(),
        engine.list().len()
    );
    server::serve(Arc::new(engine), listen_addr)
}
