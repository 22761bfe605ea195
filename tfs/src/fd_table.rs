use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use derive_more::{From, Into};

use crate::layout::{DirEntry, EntryKind};
use crate::{BlockId, Error, Result};

/// 文件描述符，即打开文件表的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct Fd(usize);

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 打开的文件或目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    /// 规范化后的绝对路径
    pub path: String,
    pub kind: EntryKind,
    pub cursor: usize,
    pub first: BlockId,
    /// 所在目录的首块
    pub parent: BlockId,
    pub size: usize,
}

impl OpenFile {
    pub fn new(path: String, entry: &DirEntry) -> Self {
        Self {
            path,
            kind: entry.kind,
            cursor: 0,
            first: entry.first,
            parent: entry.parent,
            size: entry.size as usize,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// 定长的打开文件表，以首块去重
#[derive(Debug)]
pub(crate) struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
}

impl OpenFileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// 同一首块已经打开时返回原来的描述符，否则占用第一个空位。
    pub fn open(&mut self, file: OpenFile) -> Result<Fd> {
        if let Some(fd) = self.find_by_first(file.first) {
            return Ok(fd);
        }

        let idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::TooManyOpenFiles)?;
        self.slots[idx] = Some(file);
        Ok(Fd(idx))
    }

    pub fn get(&self, fd: Fd) -> Result<&OpenFile> {
        self.slots
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidDescriptor)
    }

    pub fn close(&mut self, fd: Fd) -> Result<OpenFile> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or(Error::InvalidDescriptor)
    }

    pub fn find_by_first(&self, first: BlockId) -> Option<Fd> {
        self.iter().find(|(_, f)| f.first == first).map(|(fd, _)| fd)
    }

    /// 丢弃描述符，不写回
    pub fn discard(&mut self, first: BlockId) {
        if let Some(fd) = self.find_by_first(first) {
            self.slots[fd.0] = None;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Fd, &OpenFile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (Fd(i), f)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Fd, &mut OpenFile)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, f)| f.as_mut().map(|f| (Fd(i), f)))
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, first: u16) -> OpenFile {
        let entry = DirEntry::new(name, EntryKind::File, BlockId::new(4), BlockId::new(first)).unwrap();
        OpenFile::new(["/", name].concat(), &entry)
    }

    #[test]
    fn idempotent_open() {
        let mut table = OpenFileTable::new(4);
        let a = table.open(file("a", 10)).unwrap();
        let b = table.open(file("b", 11)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, table.open(file("a", 10)).unwrap());

        table.close(a).unwrap();
        assert_eq!(Err(Error::InvalidDescriptor), table.close(a));
        assert_eq!(Err(Error::InvalidDescriptor), table.get(Fd(99)).map(|_| ()));
        // 空位被重新利用
        assert_eq!(a, table.open(file("c", 12)).unwrap());
    }

    #[test]
    fn full_table() {
        let mut table = OpenFileTable::new(2);
        table.open(file("a", 10)).unwrap();
        table.open(file("b", 11)).unwrap();
        assert_eq!(Err(Error::TooManyOpenFiles), table.open(file("c", 12)));
        table.discard(BlockId::new(10));
        assert_eq!(1, table.iter().count());
        assert!(table.open(file("c", 12)).is_ok());
    }
}
