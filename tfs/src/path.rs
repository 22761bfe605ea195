use alloc::string::String;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::layout::{DirEntry, Fat};
use crate::{BlockId, Directory, Error, Result, Slot};

/// 绝对路径的辅助方法。
///
/// 路径必须以`/`开头，连续的`/`与结尾的`/`都被忽略。
pub trait Path {
    fn is_absolute(&self) -> bool;

    /// 非空的路径分量
    fn components(&self) -> impl DoubleEndedIterator<Item = &str>;

    /// 返回路径的`(父目录, 文件名)`，根目录返回`None`
    fn parent_file(&self) -> Option<(&str, &str)>;

    /// 去掉多余的`/`
    fn normalize(&self) -> String;

    fn join(&self, name: &str) -> String;

    fn is_root(&self) -> bool {
        self.is_absolute() && self.components().next().is_none()
    }
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.split('/').filter(|s| !s.is_empty())
    }

    fn parent_file(&self) -> Option<(&str, &str)> {
        let trimmed = self.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        trimmed.rsplit_once('/').map(|(p, f)| {
            let p = p.trim_end_matches('/');
            if p.is_empty() { ("/", f) } else { (p, f) }
        })
    }

    fn normalize(&self) -> String {
        let mut out = String::with_capacity(self.len());
        for cmp in self.components() {
            out.push('/');
            out.push_str(cmp);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    fn join(&self, name: &str) -> String {
        let mut out = self.normalize();
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(name);
        out
    }
}

/// 解析路径时经过的一个目录项
#[derive(Debug, Clone, Copy)]
pub(crate) struct Step {
    /// 目录项所在的目录
    pub dir: Directory,
    pub slot: Slot,
    pub entry: DirEntry,
}

/// 从根目录出发逐级查找，返回路径上的每一个目录项。
/// 根目录本身没有目录项，所以`/`得到空表。
pub(crate) fn walk(dev: &dyn BlockDevice, fat: &Fat, root: BlockId, path: &str) -> Result<Vec<Step>> {
    if !path.is_absolute() {
        return Err(Error::InvalidPath);
    }

    let mut steps: Vec<Step> = Vec::new();
    let mut dir = Directory::new(root);
    for cmp in path.components() {
        if let Some(prev) = steps.last() {
            if !prev.entry.is_dir() {
                return Err(Error::NotADirectory);
            }
            dir = Directory::new(prev.entry.first);
        }
        let (slot, entry) = dir.find(dev, fat, cmp)?.ok_or(Error::NotFound)?;
        steps.push(Step { dir, slot, entry });
    }
    Ok(steps)
}

/// `None`表示根目录
pub(crate) fn resolve(dev: &dyn BlockDevice, fat: &Fat, root: BlockId, path: &str) -> Result<Option<Step>> {
    Ok(walk(dev, fat, root, path)?.pop())
}

/// 解析到一个目录，目标是文件时报错
pub(crate) fn resolve_dir(dev: &dyn BlockDevice, fat: &Fat, root: BlockId, path: &str) -> Result<Directory> {
    match resolve(dev, fat, root, path)? {
        None => Ok(Directory::new(root)),
        Some(step) if step.entry.is_dir() => Ok(Directory::new(step.entry.first)),
        Some(_) => Err(Error::NotADirectory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_file() {
        assert_eq!(None, "/".parent_file());
        assert_eq!(None, "//".parent_file());
        assert_eq!(Some(("/", "a")), "/a".parent_file());
        assert_eq!(Some(("/a", "b")), "/a/b".parent_file());
        assert_eq!(Some(("/a", "b")), "/a//b/".parent_file());
        assert_eq!(Some(("/", "a")), "//a".parent_file());
    }

    #[test]
    fn normalize_and_join() {
        assert_eq!("/", "/".normalize());
        assert_eq!("/a/b", "//a///b/".normalize());
        assert_eq!("/x", "/".join("x"));
        assert_eq!("/a/x", "/a/".join("x"));
    }

    #[test]
    fn components() {
        assert!("/".is_root());
        assert!(!"/a".is_root());
        assert!(!"a".is_absolute());
        assert_eq!(["a", "b"], "/a//b/".components().collect::<Vec<_>>().as_slice());
    }
}
