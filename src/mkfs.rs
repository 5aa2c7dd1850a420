//! create our volume
use crate::{
    fs::{metadata::MetadataTables, Geometry},
    store::{BackingStore, ImageFile},
};
use anyhow::anyhow;
use byte_unit::{Byte, ByteUnit};
use log::info;
use std::path::Path;

/// create a new volume image, given the path of the image file and its geometry
/// # Params
/// - `image_file_path`: the path of the image file, must not exist yet
/// - `geometry`: capacity constants and total size of the volume
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, geometry: Geometry) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    // check if specified total size is enough
    // for the metadata blocks plus one data block
    let space_needed = geometry.min_total_size();
    if geometry.total_size < space_needed {
        return Err(anyhow!(
            "Volume size must be at least {} for block size {}, {} files and {} blocks",
            Byte::from_bytes(space_needed as _).get_appropriate_unit(true),
            Byte::from_bytes(geometry.block_size as _).get_adjusted_unit(ByteUnit::B),
            geometry.max_files,
            geometry.max_blocks
        ));
    }
    geometry.validate()?;

    let layout = geometry.layout();
    let mut image = ImageFile::create_new(image_file_path.as_ref(), geometry.total_size)?;
    // every slot free
    MetadataTables::new(geometry.max_files, geometry.max_blocks)
        .serialize_into(&mut image, &layout)?;
    image.flush()?;

    info!(
        "created volume {:?}: {}, {} data blocks of {} bytes",
        image_file_path.as_ref(),
        Byte::from_bytes(geometry.total_size as _).get_appropriate_unit(true),
        layout.data_blocks(),
        layout.block_size
    );
    Ok(())
}
