//! # 目录管理层
//!
//! 目录是一条块链，每块存放[`DIR_CAPACITY`]个目录项，
//! 项数只记在首块的前两字节里。
//! 所有目录项始终紧密排列：第`i`项位于链上第`i / DIR_CAPACITY`块的
//! 第`i % DIR_CAPACITY`个槽位。

use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::block::{self, BlockId};
use crate::layout::{get_u16, put_u16, DirEntry, Fat};
use crate::{Error, Result};
use crate::{DIR_CAPACITY, ENTRY_SIZE};

/// 目录项在磁盘上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub block: BlockId,
    pub index: usize,
}

impl Slot {
    fn range(&self) -> core::ops::Range<usize> {
        self.index * ENTRY_SIZE..(self.index + 1) * ENTRY_SIZE
    }
}

/// 以首块标识的目录，本身不缓存任何内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directory {
    first: BlockId,
}

impl Directory {
    pub fn new(first: BlockId) -> Self {
        Self { first }
    }

    pub fn first(&self) -> BlockId {
        self.first
    }

    /// 把首块清零，即项数为0的空目录
    pub fn init(&self, dev: &dyn BlockDevice) -> Result<()> {
        block::write(dev, self.first, &[0; crate::BLOCK_SIZE])
    }

    pub fn len(&self, dev: &dyn BlockDevice) -> Result<usize> {
        Ok(get_u16(&block::read(dev, self.first)?, 0) as usize)
    }

    pub fn is_empty(&self, dev: &dyn BlockDevice) -> Result<bool> {
        Ok(self.len(dev)? == 0)
    }

    fn set_len(&self, dev: &dyn BlockDevice, len: usize) -> Result<()> {
        let mut data = block::read(dev, self.first)?;
        put_u16(&mut data, 0, len as u16);
        block::write(dev, self.first, &data)
    }

    /// 链上的块数
    pub fn block_count(&self, fat: &Fat) -> usize {
        fat.chain(self.first).count()
    }

    /// 第`i`项所在位置
    fn slot_of(&self, fat: &Fat, i: usize) -> Result<Slot> {
        let block = fat
            .nth(self.first, i / DIR_CAPACITY)
            .ok_or(Error::BadBlock(BlockId::END))?;
        Ok(Slot {
            block,
            index: i % DIR_CAPACITY,
        })
    }

    /// 按链上顺序遍历所有目录项，连同位置一并返回
    pub fn slots(&self, dev: &dyn BlockDevice, fat: &Fat) -> Result<Vec<(Slot, DirEntry)>> {
        let mut rest = self.len(dev)?;
        let mut out = Vec::with_capacity(rest);
        for id in fat.chain(self.first) {
            if rest == 0 {
                break;
            }
            let data = block::read(dev, id)?;
            for index in 0..rest.min(DIR_CAPACITY) {
                let slot = Slot { block: id, index };
                out.push((slot, DirEntry::decode(&data[slot.range()])));
            }
            rest -= rest.min(DIR_CAPACITY);
        }
        Ok(out)
    }

    pub fn entries(&self, dev: &dyn BlockDevice, fat: &Fat) -> Result<Vec<DirEntry>> {
        Ok(self.slots(dev, fat)?.into_iter().map(|(_, e)| e).collect())
    }

    /// 按名称查找，第一个匹配者胜出
    pub fn find(
        &self,
        dev: &dyn BlockDevice,
        fat: &Fat,
        name: &str,
    ) -> Result<Option<(Slot, DirEntry)>> {
        Ok(self
            .slots(dev, fat)?
            .into_iter()
            .find(|(_, e)| e.name_eq(name)))
    }

    /// 按首块查找，活着的目录项首块互不相同
    pub fn find_by_first(
        &self,
        dev: &dyn BlockDevice,
        fat: &Fat,
        first: BlockId,
    ) -> Result<Option<(Slot, DirEntry)>> {
        Ok(self
            .slots(dev, fat)?
            .into_iter()
            .find(|(_, e)| e.first == first))
    }

    pub fn read_slot(&self, dev: &dyn BlockDevice, slot: Slot) -> Result<DirEntry> {
        Ok(DirEntry::decode(&block::read(dev, slot.block)?[slot.range()]))
    }

    /// 原地覆盖一个槽位
    pub fn update(&self, dev: &dyn BlockDevice, slot: Slot, entry: &DirEntry) -> Result<()> {
        let mut data = block::read(dev, slot.block)?;
        entry.encode(&mut data[slot.range()]);
        block::write(dev, slot.block, &data)
    }

    /// 追加到最后一块，最后一块已满时先向链尾接一块新的。
    pub fn insert(&self, dev: &dyn BlockDevice, fat: &mut Fat, entry: &DirEntry) -> Result<Slot> {
        let len = self.len(dev)?;
        if len > 0 && len % DIR_CAPACITY == 0 {
            let new = fat.alloc()?;
            if let Err(e) = Directory::new(new)
                .init(dev)
                .and_then(|()| fat.append(self.first, new))
            {
                fat.free(dev, new)?;
                return Err(e);
            }
            log::debug!("directory {} grows to block {new}", self.first);
        }

        let slot = self.slot_of(fat, len)?;
        self.update(dev, slot, entry)?;
        self.set_len(dev, len + 1)?;
        Ok(slot)
    }

    /// 删除`slot`处的目录项：把最后一项搬进空位，再清掉最后一个槽位。
    /// 最后一块因此变空时归还给分配表，首块始终保留。
    pub fn remove(&self, dev: &dyn BlockDevice, fat: &mut Fat, slot: Slot) -> Result<()> {
        let len = self.len(dev)?;
        if len == 0 {
            return Err(Error::NotFound);
        }
        if len == 1 {
            return self.init(dev);
        }

        let last = self.slot_of(fat, len - 1)?;
        if last != slot {
            let moved = self.read_slot(dev, last)?;
            self.update(dev, slot, &moved)?;
        }
        let mut data = block::read(dev, last.block)?;
        DirEntry::clear(&mut data[last.range()]);
        block::write(dev, last.block, &data)?;
        self.set_len(dev, len - 1)?;

        if last.index == 0 && last.block != self.first {
            if let Some(tail) = fat.detach_last(self.first) {
                fat.free(dev, tail)?;
                log::debug!("directory {} shrinks, block {tail} reclaimed", self.first);
            }
        }
        Ok(())
    }
}
