use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use block_dev::{check_access, BlockDevice, BlockError, BLOCK_SIZE};
use send_wrapper::SendWrapper;

/// 以宿主文件作为镜像的块设备，只在 shell 所在的线程上使用
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    blocks: usize,
}

impl BlockFile {
    /// 新建（或截断）镜像文件，长度为`blocks`个块
    pub fn create(path: impl AsRef<Path>, blocks: usize) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len((blocks * BLOCK_SIZE) as u64)?;
        Ok(Self::new(fd, blocks))
    }

    /// 打开已有的镜像，不足一块的尾部忽略
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let blocks = fd.metadata()?.len() as usize / BLOCK_SIZE;
        Ok(Self::new(fd, blocks))
    }

    fn new(fd: File, blocks: usize) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            blocks,
        }
    }

    /// 镜像的字节数
    pub fn size(&self) -> u64 {
        (self.blocks * BLOCK_SIZE) as u64
    }

    fn seek_to(file: &mut File, block_id: usize) -> io::Result<()> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        Ok(())
    }
}

fn host_failure(err: io::Error) -> BlockError {
    log::error!("image I/O failed: {err}");
    BlockError::Io
}

impl BlockDevice for BlockFile {
    fn num_blocks(&self) -> usize {
        self.blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), BlockError> {
        check_access(block_id, self.blocks, buf.len())?;
        let mut file = self.inner.borrow_mut();
        Self::seek_to(&mut file, block_id)
            .and_then(|()| file.read_exact(&mut buf[..BLOCK_SIZE]))
            .map_err(host_failure)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), BlockError> {
        check_access(block_id, self.blocks, buf.len())?;
        let mut file = self.inner.borrow_mut();
        Self::seek_to(&mut file, block_id)
            .and_then(|()| file.write_all(&buf[..BLOCK_SIZE]))
            .map_err(host_failure)
    }

    fn flush(&self) -> Result<(), BlockError> {
        self.inner.borrow_mut().sync_data().map_err(host_failure)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tfs-{}-{name}", std::process::id()))
    }

    #[test]
    fn persists_blocks() {
        let path = scratch("persist.img");
        let file = BlockFile::create(&path, 16).unwrap();
        assert_eq!(16, file.num_blocks());
        assert_eq!(16 * BLOCK_SIZE as u64, file.size());
        file.write_block(3, &[0xAB; BLOCK_SIZE]).unwrap();
        file.flush().unwrap();
        drop(file);

        let file = BlockFile::open(&path).unwrap();
        assert_eq!(16, file.num_blocks());
        let mut buf = [0; BLOCK_SIZE];
        file.read_block(3, &mut buf).unwrap();
        assert_eq!([0xAB; BLOCK_SIZE], buf);
        file.read_block(4, &mut buf).unwrap();
        assert_eq!([0; BLOCK_SIZE], buf);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bounds_and_missing() {
        let path = scratch("bounds.img");
        let file = BlockFile::create(&path, 2).unwrap();
        assert_eq!(
            Err(BlockError::OutOfRange { block: 2, blocks: 2 }),
            file.write_block(2, &[0; BLOCK_SIZE])
        );
        assert_eq!(
            Err(BlockError::ShortBuffer { len: 4 }),
            file.read_block(0, &mut [0; 4])
        );
        std::fs::remove_file(&path).unwrap();

        let err = BlockFile::open(scratch("absent.img")).unwrap_err();
        assert_eq!(io::ErrorKind::NotFound, err.kind());
    }
}
