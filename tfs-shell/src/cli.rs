use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TFS 交互式 shell
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// 镜像文件，不存在时由 mkfs 创建
    #[arg(short, long, default_value = "TFSDiskFile")]
    pub image: PathBuf,

    /// mkfs 新建镜像时的块数
    #[arg(short, long, default_value_t = 2048)]
    pub blocks: usize,
}

/// shell 的一行输入
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// 格式化镜像
    Mkfs,
    /// 挂载
    Mount,
    /// 卸载
    Umount,
    /// 把内存中的超级块与分配表写回
    Sync,
    /// 打印盘上的超级块与分配表
    Prrfs,
    /// 打印内存中的超级块与分配表
    Prmfs,
    Mkdir {
        path: String,
    },
    Rmdir {
        path: String,
    },
    Ls {
        path: String,
    },
    Create {
        path: String,
    },
    Rm {
        path: String,
    },
    /// 从偏移处打印若干字节
    Print {
        path: String,
        offset: usize,
        count: usize,
    },
    /// 在文件末尾追加若干个`X`
    Append {
        path: String,
        count: usize,
    },
    /// 把文件复制到目录下，保留文件名
    Cp {
        src: String,
        dest_dir: String,
    },
    Rename {
        path: String,
        new_name: String,
    },
    /// 卸载并关闭镜像
    Exit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mkfs => "mkfs",
            Self::Mount => "mount",
            Self::Umount => "umount",
            Self::Sync => "sync",
            Self::Prrfs => "prrfs",
            Self::Prmfs => "prmfs",
            Self::Mkdir { .. } => "mkdir",
            Self::Rmdir { .. } => "rmdir",
            Self::Ls { .. } => "ls",
            Self::Create { .. } => "create",
            Self::Rm { .. } => "rm",
            Self::Print { .. } => "print",
            Self::Append { .. } => "append",
            Self::Cp { .. } => "cp",
            Self::Rename { .. } => "rename",
            Self::Exit => "exit",
        }
    }
}
