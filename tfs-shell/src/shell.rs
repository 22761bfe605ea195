//! # 交互层
//!
//! 每行输入由 clap 解析成 [`Command`]，一条命令对应一次文件系统调用。
//! 文件系统的错误打印为`<命令>: <错误>`，不会中断会话；
//! 只有输出端本身出错才会结束。

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tfs::{BlockDevice, Fd, Tfs, MAX_SIZE};

use crate::cli::{Command, Line};

const PROMPT: &str = "ush> ";

/// mkfs 在尚未打开镜像时用它创建块设备，参数为块数
pub type DeviceFactory = Box<dyn FnMut(usize) -> io::Result<Arc<dyn BlockDevice>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error(transparent)]
    Fs(#[from] tfs::Error),
    #[error(transparent)]
    Output(#[from] io::Error),
}

pub struct Shell {
    tfs: Tfs,
    blocks: usize,
    make_device: DeviceFactory,
}

impl Shell {
    pub fn new<F>(tfs: Tfs, blocks: usize, make_device: F) -> Self
    where
        F: FnMut(usize) -> io::Result<Arc<dyn BlockDevice>> + 'static,
    {
        Self {
            tfs,
            blocks,
            make_device: Box::new(make_device),
        }
    }

    pub fn tfs(&self) -> &Tfs {
        &self.tfs
    }

    /// 逐行执行直到 exit 或输入结束；输入结束等同于 exit。
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                self.execute(Command::Exit, out)?;
                return Ok(());
            };
            let line = line?;
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            match Line::try_parse_from(words) {
                Ok(Line { command }) => {
                    if self.execute(command, out)? == Flow::Exit {
                        return Ok(());
                    }
                }
                Err(err) => write!(out, "{err}")?,
            }
        }
    }

    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<Flow> {
        let name = command.name();
        log::debug!("{command:?}");
        match self.dispatch(command, out) {
            Ok(flow) => Ok(flow),
            Err(Failure::Fs(err)) => {
                log::warn!("{name} failed: {err:?}");
                writeln!(out, "{name}: {err}")?;
                Ok(Flow::Continue)
            }
            Err(Failure::Output(err)) => Err(err),
        }
    }

    fn dispatch<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow, Failure> {
        match command {
            Command::Mkfs => return self.mkfs(out),
            Command::Mount => self.tfs.mount()?,
            Command::Umount => self.tfs.unmount()?,
            Command::Sync => self.tfs.sync()?,
            Command::Prrfs => write!(out, "{}", self.tfs.raw_report()?)?,
            Command::Prmfs => write!(out, "{}", self.tfs.mounted_report()?)?,
            Command::Mkdir { path } => {
                let fd = self.tfs.mkdir(&path)?;
                self.tfs.close(fd)?;
            }
            Command::Rmdir { path } => self.tfs.rmdir(&path)?,
            Command::Ls { path } => {
                for entry in self.tfs.list(&path)? {
                    let kind = if entry.is_dir() { 'd' } else { '-' };
                    writeln!(out, "{kind} {:>5} {}", entry.size, entry.name())?;
                }
            }
            Command::Create { path } => {
                let fd = self.tfs.create(&path)?;
                self.tfs.close(fd)?;
            }
            Command::Rm { path } => self.tfs.delete(&path)?,
            Command::Print {
                path,
                offset,
                count,
            } => {
                let bytes = self.with_file(&path, |tfs, fd| {
                    tfs.seek(fd, offset)?;
                    // 最多读到文件末尾
                    let rest = tfs.file_size(fd)?.saturating_sub(offset);
                    let mut buf = vec![0; count.min(rest)];
                    let n = tfs.read(fd, &mut buf)?;
                    buf.truncate(n);
                    Ok(buf)
                })?;
                out.write_all(&bytes)?;
                writeln!(out)?;
            }
            Command::Append { path, count } => {
                if count > MAX_SIZE {
                    return Err(tfs::Error::FileTooLarge.into());
                }
                self.with_file(&path, |tfs, fd| tfs.append(fd, &vec![b'X'; count]))?;
            }
            Command::Cp { src, dest_dir } => self.tfs.copy(&src, &dest_dir)?,
            Command::Rename { path, new_name } => self.tfs.rename(&path, &new_name)?,
            Command::Exit => {
                self.tfs.exit()?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    /// 尚未打开镜像时先创建一个，再按设备的全部块格式化
    fn mkfs<W: Write>(&mut self, out: &mut W) -> Result<Flow, Failure> {
        if !self.tfs.is_opened() {
            match (self.make_device)(self.blocks) {
                Ok(dev) => self.tfs.attach(dev)?,
                Err(err) => {
                    writeln!(out, "mkfs: cannot create image: {err}")?;
                    return Ok(Flow::Continue);
                }
            }
        }

        let blocks = self
            .tfs
            .device()
            .map_or(self.blocks, |dev| dev.num_blocks());
        self.tfs.format(blocks)?;
        Ok(Flow::Continue)
    }

    /// 打开文件执行`f`，无论成败都关闭
    fn with_file<T>(
        &mut self,
        path: &str,
        f: impl FnOnce(&mut Tfs, Fd) -> tfs::Result<T>,
    ) -> tfs::Result<T> {
        let fd = self.tfs.open(path)?;
        let result = f(&mut self.tfs, fd);
        self.tfs.close(fd)?;
        result
    }
}
