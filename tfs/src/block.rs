use core::fmt;

use block_dev::BlockDevice;
use derive_more::{From, Into};

use crate::{DataBlock, Result, BLOCK_SIZE};

/// 块编号，同时也是分配表中的一项。
///
/// 磁盘上只保存低两字节，所以编号落在`u16`以内；
/// [`BlockId::END`]既表示链表结束，也表示“没有块”。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[repr(transparent)]
pub struct BlockId(u16);

impl BlockId {
    pub const END: Self = Self(u16::MAX);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_end(self) -> bool {
        self.0 == u16::MAX
    }

    /// `None`表示链表在此结束
    pub fn valid(self) -> Option<Self> {
        (!self.is_end()).then_some(self)
    }
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.index()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end() {
            f.write_str("END")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// 读出整块
pub(crate) fn read(dev: &dyn BlockDevice, id: BlockId) -> Result<DataBlock> {
    let mut block = [0; BLOCK_SIZE];
    dev.read_block(id.index(), &mut block)?;
    log::trace!("read block {id}");
    Ok(block)
}

pub(crate) fn write(dev: &dyn BlockDevice, id: BlockId, block: &DataBlock) -> Result<()> {
    dev.write_block(id.index(), block)?;
    log::trace!("write block {id}");
    Ok(())
}
