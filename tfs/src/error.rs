use block_dev::BlockError;

use crate::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no block store is opened")]
    NotOpened,
    #[error("file system is already mounted")]
    AlreadyMounted,
    #[error("file system is not mounted")]
    NotMounted,
    #[error("image does not carry a TFS format marker")]
    BadMagic,
    #[error("block count does not fit the on-disk layout")]
    InvalidGeometry,
    #[error("no such file or directory")]
    NotFound,
    #[error("file or directory already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("path must be absolute and name a non-root entry here")]
    InvalidPath,
    #[error("name must be 1 to 15 bytes without '/'")]
    InvalidName,
    #[error("offset lies outside the file")]
    InvalidOffset,
    #[error("bad file descriptor")]
    InvalidDescriptor,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("no free block left")]
    OutOfSpace,
    #[error("size would exceed 65535 bytes")]
    FileTooLarge,
    #[error("block {0} is outside the data region")]
    BadBlock(BlockId),
    #[error("block store: {0}")]
    Io(#[from] BlockError),
}

pub type Result<T> = core::result::Result<T, Error>;
