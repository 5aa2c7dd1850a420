use blockfs::cli_interface::BlockFsCli;
use clap::Parser;
/// a CLI interface to users to create a volume image,
/// or open one and serve it to TCP clients.
///
/// The latter blocks the program until it is killed.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = BlockFsCli::parse();
    match args {
        BlockFsCli::Mkfs(args) => {
            //create a new volume
            blockfs::mkfs::mkfs(&args.image_file_path, args.geometry())?;
        }
        BlockFsCli::Serve(args) => {
            blockfs::serve::serve_image(
                &args.volume.image_file_path,
                args.volume.geometry(),
                &args.listen,
            )?;
        }
    }
    Ok(())
}
