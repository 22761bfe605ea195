//! 目录项，28字节定长记录。
//!
//! | 偏移 | 长度 | 字段       |
//! |------|------|------------|
//! | 0    | 2    | 未使用     |
//! | 2    | 2    | 父目录首块 |
//! | 4    | 1    | 类型       |
//! | 5    | 16   | 名称       |
//! | 21   | 1    | 名称长度   |
//! | 22   | 2    | 保留       |
//! | 24   | 2    | 首块       |
//! | 26   | 2    | 大小       |
//!
//! 目录首块的前两字节是整个目录的项数，与0号槽位的未使用字节重叠，
//! 所以编解码从不触碰槽位的前两字节。

use core::str;

use super::{get_u16, put_u16};
use crate::{BlockId, Error, Result};
use crate::{ENTRY_SIZE, MAX_NAME_LEN, NAME_CAP};

const PARENT: usize = 2;
const KIND: usize = 4;
const NAME: usize = 5;
const NAME_LEN: usize = 21;
const FIRST: usize = 24;
const SIZE: usize = 26;

/// 类型字节：0为目录，1为普通文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    Directory = 0,
    File = 1,
}

impl EntryKind {
    fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Directory
        } else {
            Self::File
        }
    }

    #[inline]
    pub fn is_dir(self) -> bool {
        self == Self::Directory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// 所属目录的首块
    pub parent: BlockId,
    pub kind: EntryKind,
    name: [u8; NAME_CAP],
    name_len: u8,
    /// 自身数据（或子目录项）所在链的首块
    pub first: BlockId,
    /// 文件为字节数，目录为所有后代大小之和
    pub size: u16,
}

impl DirEntry {
    pub fn new(name: &str, kind: EntryKind, parent: BlockId, first: BlockId) -> Result<Self> {
        let mut entry = Self {
            parent,
            kind,
            name: [0; NAME_CAP],
            name_len: 0,
            first,
            size: 0,
        };
        entry.set_name(name)?;
        Ok(entry)
    }

    pub fn name(&self) -> &str {
        // 名称只能经由`set_name`写入，或从磁盘解码时截断到合法UTF-8
        str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or_default()
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name() == name
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName);
        }
        self.name = [0; NAME_CAP];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
        self.name_len = name.len() as u8;
        Ok(())
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// 写入`slot`（恰好一个槽位），保留前两字节
    pub fn encode(&self, slot: &mut [u8]) {
        debug_assert_eq!(ENTRY_SIZE, slot.len());
        put_u16(slot, PARENT, self.parent.raw());
        slot[KIND] = self.kind as u8;
        slot[NAME..NAME + NAME_CAP].copy_from_slice(&self.name);
        slot[NAME_LEN] = self.name_len;
        slot[NAME_LEN + 1..FIRST].fill(0);
        put_u16(slot, FIRST, self.first.raw());
        put_u16(slot, SIZE, self.size);
    }

    pub fn decode(slot: &[u8]) -> Self {
        let mut name = [0; NAME_CAP];
        name.copy_from_slice(&slot[NAME..NAME + NAME_CAP]);
        let mut name_len = slot[NAME_LEN].min(MAX_NAME_LEN as u8) as usize;
        // 损坏的名称截到最长的合法UTF-8前缀
        if let Err(e) = str::from_utf8(&name[..name_len]) {
            name_len = e.valid_up_to();
        }

        Self {
            parent: get_u16(slot, PARENT).into(),
            kind: EntryKind::from_byte(slot[KIND]),
            name,
            name_len: name_len as u8,
            first: get_u16(slot, FIRST).into(),
            size: get_u16(slot, SIZE),
        }
    }

    /// 清空槽位，同样保留前两字节
    pub fn clear(slot: &mut [u8]) {
        slot[PARENT..ENTRY_SIZE].fill(0);
    }
}

/// 合法名称：1到15字节，不含'/'与NUL
pub fn is_valid_name(name: &str) -> bool {
    (1..=MAX_NAME_LEN).contains(&name.len()) && !name.bytes().any(|b| b == b'/' || b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let mut entry =
            DirEntry::new("foo.txt", EntryKind::File, BlockId::new(66), BlockId::new(67)).unwrap();
        entry.size = 300;

        let mut slot = [0xEE; ENTRY_SIZE];
        entry.encode(&mut slot);
        assert_eq!([0xEE, 0xEE], slot[..2]);
        assert_eq!([66, 0], slot[2..4]);
        assert_eq!(1, slot[4]);
        assert_eq!(b"foo.txt\0\0\0\0\0\0\0\0\0", &slot[5..21]);
        assert_eq!(7, slot[21]);
        assert_eq!([0, 0], slot[22..24]);
        assert_eq!([67, 0], slot[24..26]);
        assert_eq!([0x2C, 0x01], slot[26..28]);

        assert_eq!(entry, DirEntry::decode(&slot));
    }

    #[test]
    fn directory_flag() {
        let entry = DirEntry::new("d", EntryKind::Directory, BlockId::new(3), BlockId::new(9)).unwrap();
        let mut slot = [0; ENTRY_SIZE];
        entry.encode(&mut slot);
        assert_eq!(0, slot[4]);
        assert!(DirEntry::decode(&slot).is_dir());
    }

    #[test]
    fn names() {
        let dir = BlockId::new(4);
        assert!(DirEntry::new("fifteen_bytes__", EntryKind::File, dir, dir).is_ok());
        for bad in ["", "sixteen_bytes___", "a/b"] {
            assert_eq!(
                Err(Error::InvalidName),
                DirEntry::new(bad, EntryKind::File, dir, dir)
            );
        }

        let mut entry = DirEntry::new("old", EntryKind::File, dir, dir).unwrap();
        entry.set_name("new").unwrap();
        assert!(entry.name_eq("new"));
        assert!(!entry.name_eq("old"));
    }

    #[test]
    fn clear_keeps_count() {
        let mut slot = [0xAB; ENTRY_SIZE];
        DirEntry::clear(&mut slot);
        assert_eq!([0xAB, 0xAB], slot[..2]);
        assert!(slot[2..].iter().all(|&b| b == 0));
    }
}
