use byte_unit::Byte;
use clap::Parser;

use crate::fs::{Geometry, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_BLOCKS, DEFAULT_MAX_FILES};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum BlockFsCli {
    /// create a new volume image
    Mkfs(VolumeArgs),
    /// open a volume image and serve it over TCP
    Serve(ServeArgs),
}

/// the image file and the geometry of the volume inside it
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new volume")]
pub struct VolumeArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the size of the volume, e.g. `1280`, `64KiB`
    #[clap(short, long, value_parser = parse_size, default_value = "1280")]
    pub size: u64,
    /// the number of file entry slots
    #[clap(short = 'f', long, default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,
    /// the number of chain node slots
    #[clap(short = 'n', long, default_value_t = DEFAULT_MAX_BLOCKS)]
    pub max_blocks: usize,
    /// the block size of the volume
    #[clap(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

impl VolumeArgs {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.max_files, self.max_blocks, self.block_size, self.size)
    }
}

/// serve a volume subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "serve a volume")]
pub struct ServeArgs {
    #[command(flatten)]
    pub volume: VolumeArgs,
    /// the address to listen on
    #[clap(short, long, default_value = "127.0.0.1:9000")]
    pub listen: String,
}

fn parse_size(size: &str) -> Result<u64, String> {
    let bytes = Byte::from_str(size)
        .map_err(|e| format!("invalid size {size:?}: {e}"))?
        .get_bytes();
    u64::try_from(bytes).map_err(|_| format!("size {size:?} is too large"))
}

/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = BlockFsCli::parse_from([
            "blockfs", "mkfs", "-p", "test", "-s", "4096", "-f", "8", "-n", "30", "-b", "128",
        ]);
        assert_eq!(
            args,
            BlockFsCli::Mkfs(VolumeArgs {
                image_file_path: "test".to_string(),
                size: 4096,
                max_files: 8,
                max_blocks: 30,
                block_size: 128,
            })
        );
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = BlockFsCli::parse_from([
            "blockfs",
            "mkfs",
            image_file_path_name,
            "test",
            "--size",
            "4KiB",
            "--max-files",
            "8",
            "--max-blocks",
            "30",
            "--block-size",
            "256",
        ]);
        assert_eq!(
            args,
            BlockFsCli::Mkfs(VolumeArgs {
                image_file_path: "test".to_string(),
                size: 4096,
                max_files: 8,
                max_blocks: 30,
                block_size: 256,
            })
        );
    }
    /// omitted constants fall back to the default volume
    #[test]
    fn test_defaults() {
        let args = BlockFsCli::parse_from(["blockfs", "mkfs", "-p", "test"]);
        let BlockFsCli::Mkfs(args) = args else {
            panic!("expected mkfs");
        };
        assert_eq!(args.geometry(), Geometry::default());
    }
    #[test]
    fn test_bad_size() {
        assert!(BlockFsCli::try_parse_from(["blockfs", "mkfs", "-p", "test", "-s", "lots"]).is_err());
    }
}
