#![allow(unused)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use block_dev::{BlockDevice, BlockError, MemDisk};
use tfs::{BlockId, Tfs};

pub const BLOCKS: usize = 2048;

/// 格式化并挂载一块全新的内存盘
pub fn mounted(blocks: usize) -> (Arc<MemDisk>, Tfs) {
    let disk = Arc::new(MemDisk::new(blocks));
    let mut fs = Tfs::with_device(disk.clone());
    fs.format(blocks).unwrap();
    fs.mount().unwrap();
    (disk, fs)
}

pub fn write_file(fs: &mut Tfs, path: &str, data: &[u8]) {
    let fd = fs.create(path).unwrap();
    assert_eq!(data.len(), fs.write(fd, data).unwrap());
    fs.close(fd).unwrap();
}

pub fn read_file(fs: &mut Tfs, path: &str) -> Vec<u8> {
    let fd = fs.open(path).unwrap();
    let mut buf = vec![0; fs.file_size(fd).unwrap()];
    if !buf.is_empty() {
        fs.seek(fd, 0).unwrap();
    }
    let n = fs.read(fd, &mut buf).unwrap();
    fs.close(fd).unwrap();
    buf.truncate(n);
    buf
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// 递归收集所有活着的块链
pub fn live_blocks(fs: &Tfs, path: &str, out: &mut Vec<BlockId>) {
    out.extend(fs.block_chain(path).unwrap());
    for entry in fs.list(path).unwrap() {
        let child = if path == "/" {
            format!("/{}", entry.name())
        } else {
            format!("{path}/{}", entry.name())
        };
        if entry.is_dir() {
            live_blocks(fs, &child, out);
        } else {
            out.extend(fs.block_chain(&child).unwrap());
        }
    }
}

/// 空闲块 + 活链上的块 + 元数据块 = 总块数，且没有块被重复引用
pub fn assert_conserved(fs: &Tfs) {
    let report = fs.mounted_report().unwrap();
    let reserved = report.sb.root.index();

    let mut live = Vec::new();
    live_blocks(fs, "/", &mut live);
    let unique: HashSet<_> = live.iter().copied().collect();
    assert_eq!(live.len(), unique.len(), "a block sits on two chains");
    assert!(live.iter().all(|id| id.index() >= reserved));

    let free = fs.free_blocks().unwrap();
    assert_eq!(report.sb.total_blocks as usize, free + live.len() + reserved);
}

/// 可以随时让写入失败的内存盘
pub struct FlakyDisk {
    inner: MemDisk,
    pub fail_writes: AtomicBool,
}

impl FlakyDisk {
    pub fn new(blocks: usize) -> Self {
        Self {
            inner: MemDisk::new(blocks),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

impl BlockDevice for FlakyDisk {
    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BlockError::Io);
        }
        self.inner.write_block(block_id, buf)
    }
}
