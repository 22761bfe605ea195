//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘镜像文件；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统与驱动共享同一个块大小 [`BLOCK_SIZE`]，格式化与挂载都以它为准。

#![no_std]

extern crate alloc;

mod mem_disk;

use core::any::Any;

pub use self::mem_disk::MemDisk;

/// 一个块的字节数
pub const BLOCK_SIZE: usize = 128;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 设备的总块数
    fn num_blocks(&self) -> usize;

    /// 将`block_id`号块读入`buf`，`buf`至少要有一个块那么大。
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError>;

    /// 将`buf`的前一个块写入`block_id`号块。
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError>;

    /// 把驱动内部可能缓存的数据落盘
    fn flush(&self) -> Result<(), BlockError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("block {block} is outside the device ({blocks} blocks)")]
    OutOfRange { block: usize, blocks: usize },
    #[error("buffer of {len} bytes is shorter than one block")]
    ShortBuffer { len: usize },
    #[error("backing store I/O failure")]
    Io,
}

/// 驱动共用的参数检查
pub fn check_access(block_id: usize, blocks: usize, len: usize) -> Result<(), BlockError> {
    if block_id >= blocks {
        return Err(BlockError::OutOfRange {
            block: block_id,
            blocks,
        });
    }
    if len < BLOCK_SIZE {
        return Err(BlockError::ShortBuffer { len });
    }
    Ok(())
}
