//! # 对外接口层
//!
//! [`Tfs`]持有块设备、挂载后常驻内存的超级块与分配表，以及打开文件表。
//! 状态机：未打开 → 已打开（可格式化）→ 已挂载（可读写）→ 卸载后回到已打开。

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use block_dev::BlockDevice;

use crate::directory::Directory;
use crate::fd_table::{Fd, OpenFile, OpenFileTable};
use crate::io::{self, blocks_for};
use crate::layout::{is_valid_name, DirEntry, EntryKind, Fat, SuperBlock};
use crate::path::{self, Path};
use crate::{BlockId, Error, Result};
use crate::{DEFAULT_FD_CAPACITY, MAX_SIZE};

/// 挂载期间常驻内存的元数据
#[derive(Debug)]
struct Mounted {
    sb: SuperBlock,
    fat: Fat,
}

pub struct Tfs {
    dev: Option<Arc<dyn BlockDevice>>,
    mounted: Option<Mounted>,
    fds: OpenFileTable,
}

impl Default for Tfs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tfs")
            .field("opened", &self.is_opened())
            .field("mounted", &self.is_mounted())
            .field("fds", &self.fds)
            .finish()
    }
}

/* 生命周期 */

impl Tfs {
    /// 尚未打开任何块设备
    pub fn new() -> Self {
        Self {
            dev: None,
            mounted: None,
            fds: OpenFileTable::new(DEFAULT_FD_CAPACITY),
        }
    }

    pub fn with_device(dev: Arc<dyn BlockDevice>) -> Self {
        Self {
            dev: Some(dev),
            ..Self::new()
        }
    }

    pub fn with_fd_capacity(mut self, capacity: usize) -> Self {
        self.fds = OpenFileTable::new(capacity);
        self
    }

    /// 换用另一个块设备，挂载期间不允许
    pub fn attach(&mut self, dev: Arc<dyn BlockDevice>) -> Result<()> {
        if self.is_mounted() {
            return Err(Error::AlreadyMounted);
        }
        self.dev = Some(dev);
        Ok(())
    }

    pub fn is_opened(&self) -> bool {
        self.dev.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn device(&self) -> Option<&Arc<dyn BlockDevice>> {
        self.dev.as_ref()
    }

    fn dev(&self) -> Result<&dyn BlockDevice> {
        self.dev.as_deref().ok_or(Error::NotOpened)
    }

    /// 在块设备的前`total_blocks`块上建立空的文件系统。
    pub fn format(&mut self, total_blocks: usize) -> Result<()> {
        if self.is_mounted() {
            return Err(Error::AlreadyMounted);
        }
        let dev = self.dev()?;
        if total_blocks > dev.num_blocks() {
            return Err(Error::InvalidGeometry);
        }

        let sb = SuperBlock::new(total_blocks)?;
        let fat = Fat::format(&sb);
        sb.write(dev)?;
        fat.store(dev)?;
        Directory::new(sb.root).init(dev)?;
        dev.flush()?;

        log::info!(
            "formatted {} blocks: fat {} blocks, root {}, free head {}",
            sb.total_blocks,
            sb.fat_blocks,
            sb.root,
            sb.free_head
        );
        Ok(())
    }

    pub fn mount(&mut self) -> Result<()> {
        if self.is_mounted() {
            return Err(Error::AlreadyMounted);
        }
        let dev = self.dev()?;

        let sb = SuperBlock::read(dev)?;
        if !sb.is_valid() {
            log::warn!("bad magic {} on block 1", sb.magic());
            return Err(Error::BadMagic);
        }
        let expected = SuperBlock::new(sb.total_blocks as usize)?;
        if sb.total_blocks as usize > dev.num_blocks()
            || (sb.fat_blocks, sb.root) != (expected.fat_blocks, expected.root)
        {
            return Err(Error::InvalidGeometry);
        }
        // 空闲链表头要么为空，要么落在数据区内
        if !sb.free_head.is_end()
            && !(sb.data_start() <= sb.free_head && sb.free_head.index() < sb.total_blocks as usize)
        {
            log::warn!("free head {} outside the data region", sb.free_head);
            return Err(Error::InvalidGeometry);
        }
        let fat = Fat::load(dev, &sb)?;

        log::info!("mounted: {} blocks, {} free", sb.total_blocks, fat.free_count());
        self.fds.clear();
        self.mounted = Some(Mounted { sb, fat });
        Ok(())
    }

    /// 写回所有打开文件，清空打开文件表，同步后卸载。
    pub fn unmount(&mut self) -> Result<()> {
        {
            let ctx = self.ctx()?;
            for (_, file) in ctx.fds.iter() {
                ctx.flush(file)?;
            }
        }
        self.fds.clear();
        self.sync()?;
        self.mounted = None;
        log::info!("unmounted");
        Ok(())
    }

    /// 把超级块与分配表写回块设备
    pub fn sync(&mut self) -> Result<()> {
        let mounted = self.mounted.as_mut().ok_or(Error::NotMounted)?;
        let dev = self.dev.as_deref().ok_or(Error::NotOpened)?;

        mounted.sb.free_head = mounted.fat.free_head();
        mounted.sb.write(dev)?;
        mounted.fat.store(dev)?;
        dev.flush()?;
        log::info!("synced, free head {}", mounted.sb.free_head);
        Ok(())
    }

    /// 挂载着就先卸载，再释放块设备
    pub fn exit(&mut self) -> Result<()> {
        if self.is_mounted() {
            self.unmount()?;
        }
        if let Some(dev) = self.dev.take() {
            dev.flush()?;
        }
        Ok(())
    }

    /// 直接从块设备读出的超级块与分配表，不需要挂载
    pub fn raw_report(&self) -> Result<Report> {
        let dev = self.dev()?;
        let sb = SuperBlock::read(dev)?;
        if !sb.is_valid() {
            return Err(Error::BadMagic);
        }
        let fat = Fat::load(dev, &sb)?;
        Ok(Report { sb, fat })
    }

    /// 内存中的超级块与分配表
    pub fn mounted_report(&self) -> Result<Report> {
        let mounted = self.mounted.as_ref().ok_or(Error::NotMounted)?;
        let mut sb = mounted.sb;
        sb.free_head = mounted.fat.free_head();
        Ok(Report {
            sb,
            fat: mounted.fat.clone(),
        })
    }
}

/* 文件与目录 */

impl Tfs {
    /// 创建空文件并打开它
    pub fn create(&mut self, path: &str) -> Result<Fd> {
        self.ctx()?.make(path, EntryKind::File)
    }

    /// 创建空目录并打开它
    pub fn mkdir(&mut self, path: &str) -> Result<Fd> {
        self.ctx()?.make(path, EntryKind::Directory)
    }

    /// 删除文件或目录，目录连同所有后代一起删除
    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.ctx()?.remove(path, false)
    }

    /// 同[`Tfs::delete`]，但目标必须是目录
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.ctx()?.remove(path, true)
    }

    /// 打开文件或目录；同一目录项重复打开得到同一个描述符。
    pub fn open(&mut self, path: &str) -> Result<Fd> {
        self.ctx()?.open(path)
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let ctx = self.ctx()?;
        let file = ctx.fds.close(fd)?;
        ctx.flush(&file)
    }

    /// 从游标处读，最多读到文件末尾，返回读出的字节数
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let ctx = self.ctx()?;
        let file = ctx.fds.get(fd)?;
        if file.is_dir() {
            return Err(Error::IsADirectory);
        }

        let n = buf.len().min(file.size.saturating_sub(file.cursor));
        io::read_at(ctx.dev, ctx.fat, file.first, file.cursor, &mut buf[..n])?;
        ctx.fds.get_mut(fd)?.cursor += n;
        Ok(n)
    }

    /// 在游标处写入，文件大小总是增加写入的长度
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        self.ctx()?.write(fd, data)
    }

    /// 游标移到文件末尾再写
    pub fn append(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let mut ctx = self.ctx()?;
        let file = ctx.fds.get_mut(fd)?;
        file.cursor = file.size;
        ctx.write(fd, data)
    }

    /// 移动游标并写回目录项，返回新的游标位置。
    ///
    /// 偏移必须落在`[0, size-1]`内；空文件上`seek(0)`只返回当前游标。
    pub fn seek(&mut self, fd: Fd, offset: usize) -> Result<usize> {
        let ctx = self.ctx()?;
        let file = ctx.fds.get_mut(fd)?;
        if offset == 0 && file.size == 0 {
            return Ok(file.cursor);
        }
        if offset >= file.size {
            return Err(Error::InvalidOffset);
        }

        file.cursor = offset;
        let file = ctx.fds.get(fd)?;
        ctx.flush(file)?;
        Ok(offset)
    }

    /// 只修改名称，首块、大小与内容都不变
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        let ctx = self.ctx()?;
        let mut step = path::resolve(ctx.dev, ctx.fat, ctx.root, path)?.ok_or(Error::InvalidPath)?;
        if !is_valid_name(new_name) {
            return Err(Error::InvalidName);
        }
        if step.dir.find(ctx.dev, ctx.fat, new_name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        step.entry.set_name(new_name)?;
        step.dir.update(ctx.dev, step.slot, &step.entry)?;

        // 打开着的自身与后代都换成新路径
        let old = path.normalize();
        let new = old
            .parent_file()
            .map(|(parent, _)| parent.join(new_name))
            .ok_or(Error::InvalidPath)?;
        for (_, file) in ctx.fds.iter_mut() {
            if let Some(rest) = file.path.strip_prefix(old.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    file.path = [new.as_str(), rest].concat();
                }
            }
        }
        Ok(())
    }

    /// 把文件复制到目标目录下，名称不变
    pub fn copy(&mut self, src: &str, dest_dir: &str) -> Result<()> {
        let mut ctx = self.ctx()?;
        let entry = match path::resolve(ctx.dev, ctx.fat, ctx.root, src)? {
            Some(step) if !step.entry.is_dir() => step.entry,
            _ => return Err(Error::IsADirectory),
        };
        let dir = path::resolve_dir(ctx.dev, ctx.fat, ctx.root, dest_dir)?;
        if dir.find(ctx.dev, ctx.fat, entry.name())?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let mut data = vec![0; entry.size as usize];
        io::read_at(ctx.dev, ctx.fat, entry.first, 0, &mut data)?;

        let dest = dest_dir.join(entry.name());
        ctx.check_growth(&dest, data.len())?;
        let fd = ctx.make(&dest, EntryKind::File)?;
        if let Err(e) = ctx.write(fd, &data) {
            ctx.remove(&dest, false)?;
            return Err(e);
        }
        let file = ctx.fds.close(fd)?;
        ctx.flush(&file)?;
        log::debug!("copied {src} to {dest}, {} bytes", data.len());
        Ok(())
    }

    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let (dev, mounted) = self.view()?;
        let dir = path::resolve_dir(dev, &mounted.fat, mounted.sb.root, path)?;
        dir.entries(dev, &mounted.fat)
    }

    /// 打开的目录中的目录项数
    pub fn entry_count(&self, fd: Fd) -> Result<usize> {
        let (dev, _) = self.view()?;
        let file = self.fds.get(fd)?;
        if !file.is_dir() {
            return Err(Error::NotADirectory);
        }
        Directory::new(file.first).len(dev)
    }

    pub fn file_size(&self, fd: Fd) -> Result<usize> {
        self.view()?;
        Ok(self.fds.get(fd)?.size)
    }

    pub fn open_file(&self, fd: Fd) -> Result<&OpenFile> {
        self.view()?;
        self.fds.get(fd)
    }

    /// 路径对应的块链，根目录也可以
    pub fn block_chain(&self, path: &str) -> Result<Vec<BlockId>> {
        let (dev, mounted) = self.view()?;
        let first = match path::resolve(dev, &mounted.fat, mounted.sb.root, path)? {
            Some(step) => step.entry.first,
            None => mounted.sb.root,
        };
        Ok(mounted.fat.chain(first).collect())
    }

    pub fn free_blocks(&self) -> Result<usize> {
        Ok(self.view()?.1.fat.free_count())
    }
}

impl Tfs {
    fn ctx(&mut self) -> Result<Ctx<'_>> {
        let mounted = self.mounted.as_mut().ok_or(Error::NotMounted)?;
        let dev = self.dev.as_deref().ok_or(Error::NotOpened)?;
        Ok(Ctx {
            dev,
            root: mounted.sb.root,
            fat: &mut mounted.fat,
            fds: &mut self.fds,
        })
    }

    fn view(&self) -> Result<(&dyn BlockDevice, &Mounted)> {
        let mounted = self.mounted.as_ref().ok_or(Error::NotMounted)?;
        Ok((self.dev()?, mounted))
    }
}

/// 一次操作期间借出的挂载状态
struct Ctx<'a> {
    dev: &'a dyn BlockDevice,
    root: BlockId,
    fat: &'a mut Fat,
    fds: &'a mut OpenFileTable,
}

impl Ctx<'_> {
    /// 根目录没有目录项，大小取所有子项之和
    fn root_size(&self) -> Result<usize> {
        Ok(Directory::new(self.root)
            .entries(self.dev, self.fat)?
            .iter()
            .map(|e| e.size as usize)
            .sum())
    }

    fn open(&mut self, path: &str) -> Result<Fd> {
        let file = match path::resolve(self.dev, self.fat, self.root, path)? {
            Some(step) => OpenFile::new(path.normalize(), &step.entry),
            None => OpenFile {
                path: String::from("/"),
                kind: EntryKind::Directory,
                cursor: 0,
                first: self.root,
                parent: BlockId::END,
                size: self.root_size()?,
            },
        };
        self.fds.open(file)
    }

    /// 把描述符上的大小写回目录项，按首块定位
    fn flush(&self, file: &OpenFile) -> Result<()> {
        if file.parent.is_end() {
            return Ok(());
        }
        let dir = Directory::new(file.parent);
        if let Some((slot, mut entry)) = dir.find_by_first(self.dev, self.fat, file.first)? {
            entry.size = file.size as u16;
            dir.update(self.dev, slot, &entry)?;
        }
        Ok(())
    }

    /// `path`的所有祖先目录（不含根）增长`delta`后都不能超过上限
    fn check_growth(&self, path: &str, delta: usize) -> Result<()> {
        let Some((parent, _)) = path.parent_file() else {
            return Ok(());
        };
        for step in path::walk(self.dev, self.fat, self.root, parent)? {
            if step.entry.size as usize + delta > MAX_SIZE {
                log::warn!("{parent}: directory size would exceed {MAX_SIZE}");
                return Err(Error::FileTooLarge);
            }
        }
        Ok(())
    }

    /// 把大小变化沿祖先目录一路更新到根
    fn propagate(&mut self, path: &str, delta: isize) -> Result<()> {
        let Some((parent, _)) = path.parent_file() else {
            return Ok(());
        };
        let apply = |size: usize| (size as isize + delta).clamp(0, MAX_SIZE as isize) as usize;

        for mut step in path::walk(self.dev, self.fat, self.root, parent)? {
            step.entry.size = apply(step.entry.size as usize) as u16;
            step.dir.update(self.dev, step.slot, &step.entry)?;
            if let Some(fd) = self.fds.find_by_first(step.entry.first) {
                self.fds.get_mut(fd)?.size = step.entry.size as usize;
            }
        }
        if let Some(fd) = self.fds.find_by_first(self.root) {
            let file = self.fds.get_mut(fd)?;
            file.size = apply(file.size);
        }
        Ok(())
    }

    fn make(&mut self, path: &str, kind: EntryKind) -> Result<Fd> {
        if !path.is_absolute() {
            return Err(Error::InvalidPath);
        }
        let (parent, name) = path.parent_file().ok_or(Error::AlreadyExists)?;
        if !is_valid_name(name) {
            return Err(Error::InvalidName);
        }
        let dir = path::resolve_dir(self.dev, self.fat, self.root, parent)?;
        if dir.find(self.dev, self.fat, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        if self.fds.is_full() {
            return Err(Error::TooManyOpenFiles);
        }

        let first = self.fat.alloc()?;
        let entry = DirEntry::new(name, kind, dir.first(), first)?;
        if let Err(e) = Directory::new(first)
            .init(self.dev)
            .and_then(|()| dir.insert(self.dev, self.fat, &entry).map(|_| ()))
        {
            self.fat.free(self.dev, first)?;
            return Err(e);
        }

        log::debug!("created {path} at block {first}");
        self.fds.open(OpenFile::new(path.normalize(), &entry))
    }

    fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let file = self.fds.get(fd)?.clone();
        if file.is_dir() {
            return Err(Error::IsADirectory);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let size = file.size + data.len();
        if size > MAX_SIZE {
            log::warn!("{}: file size would exceed {MAX_SIZE}", file.path);
            return Err(Error::FileTooLarge);
        }
        self.check_growth(&file.path, data.len())?;

        io::grow_chain(self.dev, self.fat, file.first, blocks_for(size))?;
        io::write_at(self.dev, self.fat, file.first, file.cursor, data)?;

        let open = self.fds.get_mut(fd)?;
        open.cursor += data.len();
        open.size = size;
        let open = self.fds.get(fd)?.clone();
        self.flush(&open)?;
        self.propagate(&file.path, data.len() as isize)?;
        Ok(data.len())
    }

    fn remove(&mut self, path: &str, require_dir: bool) -> Result<()> {
        let Some(step) = path::resolve(self.dev, self.fat, self.root, path)? else {
            log::warn!("refuse to delete the root directory");
            return Err(Error::InvalidPath);
        };
        if require_dir && !step.entry.is_dir() {
            return Err(Error::NotADirectory);
        }

        self.free_tree(&step.entry)?;
        self.propagate(path, -(step.entry.size as isize))?;
        step.dir.remove(self.dev, self.fat, step.slot)?;
        log::debug!("deleted {path}, {} bytes", step.entry.size);
        Ok(())
    }

    /// 先删后代，再归还自己的块
    fn free_tree(&mut self, entry: &DirEntry) -> Result<()> {
        if entry.is_dir() {
            for child in Directory::new(entry.first).entries(self.dev, self.fat)? {
                self.free_tree(&child)?;
            }
        }
        self.fat.free_chain(self.dev, entry.first)?;
        self.fds.discard(entry.first);
        Ok(())
    }
}

/// 超级块与分配表的摘要
#[derive(Debug, Clone)]
pub struct Report {
    pub sb: SuperBlock,
    fat: Fat,
}

impl Report {
    pub fn fat_entry(&self, index: usize) -> BlockId {
        self.fat.get(index)
    }

    pub fn fat_len(&self) -> usize {
        self.fat.len()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sb = &self.sb;
        writeln!(f, "Partition Control Block:")?;
        writeln!(f, "    The size of FS = {}", sb.total_blocks)?;
        writeln!(f, "    The size of FAT = {}", sb.fat_blocks)?;
        writeln!(f, "    The pointer to FREE = {}", sb.free_head)?;
        writeln!(f, "    The pointer to ROOT = {}", sb.root)?;

        let len = self.fat_len();
        let root = sb.root.index();
        let free = sb.free_head.index();
        writeln!(f, "File Allocation Table:")?;
        writeln!(f, "    FAT.length = {len}")?;
        for i in 0..3 {
            writeln!(f, "    FAT[{i}] = {}", self.fat_entry(i))?;
        }
        writeln!(f, "    FAT[pointer_root:{root}] = {}", self.fat_entry(root))?;
        writeln!(f, "    FAT[pointer_free:{}] = {}", sb.free_head, self.fat_entry(free))?;
        writeln!(f, "    FAT[pointer_free+1] = {}", self.fat_entry(free + 1))?;
        for back in (1..=3).rev() {
            let i = len.saturating_sub(back);
            writeln!(f, "    FAT[fat.length-{back}] = {}", self.fat_entry(i))?;
        }
        Ok(())
    }
}
