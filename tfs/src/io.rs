//! # 字节区间读写
//!
//! 把文件内的字节偏移映射到块链上：第`offset / BLOCK_SIZE`块的
//! 第`offset % BLOCK_SIZE`字节。跨块的读写逐块进行，
//! 写入不满一块时先读出原内容再覆盖。

use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::block::{self, BlockId};
use crate::layout::Fat;
use crate::{Error, Result, BLOCK_SIZE};

/// 容纳`size`字节需要的块数，空文件也占一块
pub(crate) fn blocks_for(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE).max(1)
}

/// 链上覆盖`[offset, offset + len)`的块，以及起始块内的偏移
fn covered<'a>(
    fat: &'a Fat,
    first: BlockId,
    offset: usize,
    len: usize,
) -> Result<impl Iterator<Item = BlockId> + 'a> {
    let start = offset / BLOCK_SIZE;
    let count = (offset + len).div_ceil(BLOCK_SIZE) - start;
    if len > 0 && fat.nth(first, start + count - 1).is_none() {
        return Err(Error::BadBlock(BlockId::END));
    }
    Ok(fat.chain(first).skip(start).take(count))
}

/// 从`first`开始的块链上，读出`offset`处的`buf.len()`字节
pub(crate) fn read_at(
    dev: &dyn BlockDevice,
    fat: &Fat,
    first: BlockId,
    offset: usize,
    buf: &mut [u8],
) -> Result<()> {
    let mut done = 0;
    let mut inner = offset % BLOCK_SIZE;
    for id in covered(fat, first, offset, buf.len())? {
        let data = block::read(dev, id)?;
        let n = (BLOCK_SIZE - inner).min(buf.len() - done);
        buf[done..done + n].copy_from_slice(&data[inner..inner + n]);
        done += n;
        inner = 0;
    }
    Ok(())
}

/// 把`data`写到块链的`offset`处，链必须已经足够长
pub(crate) fn write_at(
    dev: &dyn BlockDevice,
    fat: &Fat,
    first: BlockId,
    offset: usize,
    data: &[u8],
) -> Result<()> {
    let mut done = 0;
    let mut inner = offset % BLOCK_SIZE;
    for id in covered(fat, first, offset, data.len())? {
        let n = (BLOCK_SIZE - inner).min(data.len() - done);
        let mut buf = if n == BLOCK_SIZE {
            [0; BLOCK_SIZE]
        } else {
            block::read(dev, id)?
        };
        buf[inner..inner + n].copy_from_slice(&data[done..done + n]);
        block::write(dev, id, &buf)?;
        done += n;
        inner = 0;
    }
    Ok(())
}

/// 把链延长到至少`blocks`块。
///
/// 先一次分配完所有新块再逐一接上；中途空间不足时把已分配的块还回去。
pub(crate) fn grow_chain(
    dev: &dyn BlockDevice,
    fat: &mut Fat,
    first: BlockId,
    blocks: usize,
) -> Result<()> {
    let have = fat.chain(first).count();
    if blocks <= have {
        return Ok(());
    }

    let mut fresh = Vec::with_capacity(blocks - have);
    for _ in have..blocks {
        match fat.alloc() {
            Ok(id) => fresh.push(id),
            Err(e) => {
                for id in fresh {
                    fat.free(dev, id)?;
                }
                log::warn!("chain {first} cannot grow to {blocks} blocks");
                return Err(e);
            }
        }
    }
    for id in fresh {
        fat.append(first, id)?;
    }
    log::debug!("chain {first} grows from {have} to {blocks} blocks");
    Ok(())
}
