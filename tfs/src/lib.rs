//! TFS：建立在单个定长块设备之上的层次文件系统。
//!
//! 磁盘布局（块号从0开始）：
//!
//! 保留块 | 超级块 | 文件分配表 | 根目录首块 | 空闲块……
//!
//! 文件与目录都是通过分配表串起来的块链；
//! 空闲块同样由分配表串成一条单链表，表头记录在超级块中。

#![no_std]

extern crate alloc;

/* 自下而上 */

// 块编号
mod block;
pub use block::BlockId;

// 磁盘数据结构层：超级块、分配表、目录项的编解码
pub mod layout;

// 多块目录的管理
mod directory;
pub use directory::{Directory, Slot};

// 打开文件表
mod fd_table;
pub use fd_table::{Fd, OpenFile};

// 路径解析
mod path;
pub use path::Path;

// 字节区间读写引擎
mod io;

// 对外接口
mod fs;
pub use fs::{Report, Tfs};

mod error;
pub use error::{Error, Result};

pub use block_dev::{BlockDevice, BlockError, BLOCK_SIZE};
pub use layout::{DirEntry, EntryKind};

/// 格式标记，挂载时用以确认镜像属于本文件系统
pub const MAGIC: u16 = 777;

/// 超级块所在块，0号块保留不用
pub const SUPER_BLOCK: usize = 1;
/// 分配表的起始块
pub const FAT_START: usize = 2;
/// 分配表每项在磁盘上占用的字节数
pub const FAT_ENTRY_SIZE: usize = 4;

/// 目录项大小
pub const ENTRY_SIZE: usize = 28;
/// 一个目录块能容纳的目录项数
pub const DIR_CAPACITY: usize = BLOCK_SIZE / ENTRY_SIZE;
/// 名称字段的宽度
pub const NAME_CAP: usize = 16;
/// 名称的最大字节数
pub const MAX_NAME_LEN: usize = NAME_CAP - 1;

/// 磁盘上的整数只有低两字节，文件与目录大小都不能超过它
pub const MAX_SIZE: usize = u16::MAX as usize;

/// 打开文件表的默认容量
pub const DEFAULT_FD_CAPACITY: usize = 100;

type DataBlock = [u8; BLOCK_SIZE];
