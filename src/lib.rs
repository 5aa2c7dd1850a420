pub mod cli_interface;
pub mod error;
mod fs;
pub mod mkfs;
pub mod serve;
pub mod server;
pub mod store;
pub mod utils;
pub use error::{Result, StorageError};
pub use fs::*;
