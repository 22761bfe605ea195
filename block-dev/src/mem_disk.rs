use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::{check_access, BlockDevice, BlockError, BLOCK_SIZE};

/// 内存中的块设备，测试与临时镜像使用
#[derive(Debug)]
pub struct MemDisk {
    data: Mutex<Vec<u8>>,
    blocks: usize,
}

impl MemDisk {
    pub fn new(blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; blocks * BLOCK_SIZE]),
            blocks,
        }
    }

    /// 整个镜像的拷贝
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl BlockDevice for MemDisk {
    fn num_blocks(&self) -> usize {
        self.blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        check_access(block_id, self.blocks, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        buf[..BLOCK_SIZE].copy_from_slice(&self.data.lock()[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        check_access(block_id, self.blocks, buf.len())?;
        let start = block_id * BLOCK_SIZE;
        self.data.lock()[start..start + BLOCK_SIZE].copy_from_slice(&buf[..BLOCK_SIZE]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back() {
        let disk = MemDisk::new(4);
        let block = [0x5A; BLOCK_SIZE];
        disk.write_block(3, &block).unwrap();

        let mut buf = [0; BLOCK_SIZE];
        disk.read_block(3, &mut buf).unwrap();
        assert_eq!(block, buf);

        disk.read_block(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_access() {
        let disk = MemDisk::new(4);
        let mut buf = [0; BLOCK_SIZE];
        assert_eq!(
            Err(BlockError::OutOfRange {
                block: 4,
                blocks: 4
            }),
            disk.read_block(4, &mut buf)
        );
        assert_eq!(
            Err(BlockError::ShortBuffer { len: 8 }),
            disk.write_block(0, &[0; 8])
        );
    }
}
