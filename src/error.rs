//! error types returned by the storage engine
use std::io;

pub type Result<T> = std::result::Result<T, StorageError>;

/// every failure the engine reports to its callers
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// malformed request, e.g. an empty or over-long file name
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// no free entry slot, data block or chain node
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// the backing store could not be read, written or sized
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// the errno a POSIX-style caller would expect for this error
    pub fn errno(&self) -> libc::c_int {
        match self {
            StorageError::InvalidArgument(_) => libc::EINVAL,
            StorageError::NotFound(_) => libc::ENOENT,
            StorageError::AlreadyExists(_) => libc::EEXIST,
            StorageError::CapacityExceeded(_) => libc::ENOSPC,
            StorageError::Io(_) => libc::EIO,
        }
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        StorageError::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(StorageError::InvalidArgument("x".into()).errno(), libc::EINVAL);
        assert_eq!(StorageError::NotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(StorageError::AlreadyExists("x".into()).errno(), libc::EEXIST);
        assert_eq!(StorageError::CapacityExceeded("x".into()).errno(), libc::ENOSPC);
        assert_eq!(
            StorageError::Io(io::Error::from(io::ErrorKind::Other)).errno(),
            libc::EIO
        );
    }

    #[test]
    fn test_corrupted_is_invalid_data() {
        match StorageError::corrupted("bad name") {
            StorageError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
