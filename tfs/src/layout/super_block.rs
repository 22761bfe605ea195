use block_dev::BlockDevice;

use super::{get_u16, put_slot};
use crate::{BlockId, DataBlock, Error, Result};
use crate::{BLOCK_SIZE, FAT_ENTRY_SIZE, FAT_START, MAGIC, SUPER_BLOCK};

/// 超级块（分区控制块）：
/// - 提供文件系统合法性校验；
/// - 定位分配表、根目录与空闲链表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// 文件系统占据块数
    pub total_blocks: u16,
    /// 分配表占据块数
    pub fat_blocks: u16,
    /// 空闲链表表头
    pub free_head: BlockId,
    /// 根目录首块
    pub root: BlockId,
    /// 格式标记
    magic: u16,
}

impl SuperBlock {
    /// 按总块数计算布局：分配表紧跟超级块，根目录紧跟分配表。
    pub fn new(total_blocks: usize) -> Result<Self> {
        let fat_blocks = (total_blocks * FAT_ENTRY_SIZE).div_ceil(BLOCK_SIZE);
        let root = FAT_START + fat_blocks;
        // 块号必须小于结束标记，根目录之后也至少得留一块空闲
        if total_blocks > BlockId::END.index() || root + 1 >= total_blocks {
            return Err(Error::InvalidGeometry);
        }

        Ok(Self {
            total_blocks: total_blocks as u16,
            fat_blocks: fat_blocks as u16,
            free_head: BlockId::new(root as u16 + 1),
            root: BlockId::new(root as u16),
            magic: MAGIC,
        })
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn magic(&self) -> u16 {
        self.magic
    }

    /// 数据区起点，之前的块都属于元数据，不可释放
    pub fn data_start(&self) -> BlockId {
        BlockId::new((FAT_START + self.fat_blocks as usize) as u16)
    }

    pub fn encode(&self, block: &mut DataBlock) {
        block.fill(0);
        put_slot(block, 0, self.total_blocks);
        put_slot(block, 4, self.fat_blocks);
        put_slot(block, 8, self.free_head.raw());
        put_slot(block, 12, self.root.raw());
        put_slot(block, 16, self.magic);
    }

    pub fn decode(block: &DataBlock) -> Self {
        Self {
            total_blocks: get_u16(block, 0),
            fat_blocks: get_u16(block, 4),
            free_head: get_u16(block, 8).into(),
            root: get_u16(block, 12).into(),
            magic: get_u16(block, 16),
        }
    }

    /// 读取磁盘上的超级块，不做合法性校验
    pub fn read(dev: &dyn BlockDevice) -> Result<Self> {
        let mut block = [0; BLOCK_SIZE];
        dev.read_block(SUPER_BLOCK, &mut block)?;
        Ok(Self::decode(&block))
    }

    pub fn write(&self, dev: &dyn BlockDevice) -> Result<()> {
        let mut block = [0; BLOCK_SIZE];
        self.encode(&mut block);
        dev.write_block(SUPER_BLOCK, &block)?;
        Ok(())
    }
}
