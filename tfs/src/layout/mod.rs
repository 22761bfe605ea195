//! # 磁盘数据结构层
//!
//! 保留块 | 超级块 | 分配表 | 根目录 | 数据块
//!
//! 所有整数字段都只持久化低两字节（小端），
//! 超级块与分配表仍为每个整数预留四字节的槽位。

mod dir_entry;
mod fat;
mod super_block;

pub use self::dir_entry::{is_valid_name, DirEntry, EntryKind};
pub use self::fat::{Chain, Fat};
pub use self::super_block::SuperBlock;

#[inline]
pub(crate) fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// 四字节槽位：低两字节存值，高两字节清零
#[inline]
pub(crate) fn put_slot(buf: &mut [u8], offset: usize, value: u16) {
    put_u16(buf, offset, value);
    buf[offset + 2..offset + 4].fill(0);
}
