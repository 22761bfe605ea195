use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use super::{get_u16, put_slot, SuperBlock};
use crate::{BlockId, Error, Result};
use crate::{BLOCK_SIZE, FAT_ENTRY_SIZE, FAT_START};

/// 文件分配表。
///
/// 每个块对应一项，项中存放链表上的下一个块编号：
/// 文件、目录的块链与空闲链表共用同一张表。
/// 挂载期间常驻内存，卸载或同步时整体写回。
#[derive(Debug, Clone)]
pub struct Fat {
    entries: Vec<BlockId>,
    free_head: BlockId,
    /// 数据区起点（根目录首块），之前的块不参与分配
    data_start: BlockId,
}

impl Fat {
    /// 全新的分配表：根目录独占一块，其后所有块按升序串成空闲链表。
    pub fn format(sb: &SuperBlock) -> Self {
        let total = sb.total_blocks as usize;
        let mut entries = vec![BlockId::END; total];
        for i in sb.free_head.index()..total - 1 {
            entries[i] = BlockId::new(i as u16 + 1);
        }

        Self {
            entries,
            free_head: sb.free_head,
            data_start: sb.data_start(),
        }
    }

    pub fn load(dev: &dyn BlockDevice, sb: &SuperBlock) -> Result<Self> {
        let total = sb.total_blocks as usize;
        let mut entries = Vec::with_capacity(total);
        let mut block = [0; BLOCK_SIZE];
        'outer: for i in 0..sb.fat_blocks as usize {
            dev.read_block(FAT_START + i, &mut block)?;
            for slot in block.chunks_exact(FAT_ENTRY_SIZE) {
                if entries.len() == total {
                    break 'outer;
                }
                entries.push(BlockId::new(get_u16(slot, 0)));
            }
        }
        if entries.len() < total {
            return Err(Error::InvalidGeometry);
        }

        Ok(Self {
            entries,
            free_head: sb.free_head,
            data_start: sb.data_start(),
        })
    }

    /// 整张表写回分配表区域，不足一块的部分补零
    pub fn store(&self, dev: &dyn BlockDevice) -> Result<()> {
        let per_block = BLOCK_SIZE / FAT_ENTRY_SIZE;
        for (i, ids) in self.entries.chunks(per_block).enumerate() {
            let mut block = [0; BLOCK_SIZE];
            for (j, id) in ids.iter().enumerate() {
                put_slot(&mut block, j * FAT_ENTRY_SIZE, id.raw());
            }
            dev.write_block(FAT_START + i, &block)?;
        }
        log::trace!("fat stored: {} entries", self.entries.len());
        Ok(())
    }

    #[inline]
    pub fn free_head(&self) -> BlockId {
        self.free_head
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// 原始表项，越界时视为链表结束
    pub fn get(&self, index: usize) -> BlockId {
        self.entries.get(index).copied().unwrap_or(BlockId::END)
    }

    /// 数据区内的块才能被分配、释放或链接
    fn in_data_region(&self, id: BlockId) -> bool {
        id >= self.data_start && id.index() < self.entries.len()
    }

    /// 从空闲链表头取下一块，并把它标记为链尾。
    /// 表头落在数据区之外说明表已损坏。
    pub fn alloc(&mut self) -> Result<BlockId> {
        let id = self.free_head.valid().ok_or(Error::OutOfSpace)?;
        if !self.in_data_region(id) {
            log::warn!("free head {id} outside the data region");
            return Err(Error::BadBlock(id));
        }
        self.free_head = self.entries[id.index()];
        self.entries[id.index()] = BlockId::END;
        log::debug!("alloc block {id}, free head -> {}", self.free_head);
        Ok(id)
    }

    /// 把一块归还到空闲链表头并清零其内容。
    /// 元数据区或越界的块号直接忽略。
    pub fn free(&mut self, dev: &dyn BlockDevice, id: BlockId) -> Result<()> {
        if !self.in_data_region(id) {
            log::warn!("refuse to free block {id}");
            return Ok(());
        }

        self.entries[id.index()] = self.free_head;
        self.free_head = id;
        dev.write_block(id.index(), &[0; BLOCK_SIZE])?;
        log::debug!("free block {id}");
        Ok(())
    }

    /// 释放整条链
    pub fn free_chain(&mut self, dev: &dyn BlockDevice, start: BlockId) -> Result<()> {
        let blocks: Vec<_> = self.chain(start).collect();
        for id in blocks {
            self.free(dev, id)?;
        }
        Ok(())
    }

    /// 把`new`接到以`start`开头的链尾，`new`成为新的链尾。
    pub fn append(&mut self, start: BlockId, new: BlockId) -> Result<()> {
        for id in [start, new] {
            if !self.in_data_region(id) {
                return Err(Error::BadBlock(id));
            }
        }

        let last = self.last(start);
        self.entries[last.index()] = new;
        self.entries[new.index()] = BlockId::END;
        Ok(())
    }

    /// 下一个块，`None`表示`id`已是链尾；越界的表项同样视为链尾
    pub fn next(&self, id: BlockId) -> Option<BlockId> {
        self.entries
            .get(id.index())
            .and_then(|next| next.valid())
            .filter(|next| next.index() < self.entries.len())
    }

    pub fn chain(&self, start: BlockId) -> Chain<'_> {
        Chain {
            fat: self,
            cur: start.valid().filter(|id| id.index() < self.entries.len()),
            steps: 0,
        }
    }

    /// 链上第`n`块（从0开始）
    pub fn nth(&self, start: BlockId, n: usize) -> Option<BlockId> {
        self.chain(start).nth(n)
    }

    pub fn last(&self, start: BlockId) -> BlockId {
        self.chain(start).last().unwrap_or(start)
    }

    /// 摘下链尾并返回它，链只剩一块时不动。
    pub fn detach_last(&mut self, start: BlockId) -> Option<BlockId> {
        let blocks: Vec<_> = self.chain(start).collect();
        let &[.., prev, last] = blocks.as_slice() else {
            return None;
        };
        self.entries[prev.index()] = BlockId::END;
        Some(last)
    }

    pub fn free_count(&self) -> usize {
        self.chain(self.free_head).count()
    }
}

/// 沿分配表遍历一条块链。
///
/// 步数超过表长时停止，损坏的表上出现环也不会死循环。
pub struct Chain<'a> {
    fat: &'a Fat,
    cur: Option<BlockId>,
    steps: usize,
}

impl Iterator for Chain<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.steps >= self.fat.entries.len() {
            return None;
        }
        let cur = self.cur?;
        self.steps += 1;
        self.cur = self.fat.next(cur);
        Some(cur)
    }
}
