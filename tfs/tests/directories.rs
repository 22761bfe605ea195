use std::collections::HashMap;

use tfs::{DirEntry, EntryKind, Error, DIR_CAPACITY};

mod common;

use common::{assert_conserved, mounted, pattern, read_file, write_file, BLOCKS};

#[test]
fn grows_and_shrinks() {
    let (_, mut fs) = mounted(BLOCKS);
    let dir = fs.mkdir("/dir").unwrap();
    fs.close(dir).unwrap();
    assert_eq!(4, DIR_CAPACITY);

    for i in 0..5 {
        let fd = fs.create(&format!("/dir/f{i}")).unwrap();
        fs.close(fd).unwrap();
    }
    assert_eq!(2, fs.block_chain("/dir").unwrap().len());
    assert_eq!(5, fs.list("/dir").unwrap().len());

    let free = fs.free_blocks().unwrap();
    fs.delete("/dir/f0").unwrap();
    fs.delete("/dir/f3").unwrap();
    assert_eq!(1, fs.block_chain("/dir").unwrap().len());
    // 两个文件各一块，外加目录的第二块
    assert_eq!(free + 3, fs.free_blocks().unwrap());

    let dir = fs.open("/dir").unwrap();
    assert_eq!(3, fs.entry_count(dir).unwrap());
    assert_eq!(3, fs.list("/dir").unwrap().len());
    assert_conserved(&fs);
}

#[test]
fn many_blocks() {
    let (_, mut fs) = mounted(BLOCKS);
    fs.mkdir("/many").unwrap();
    for i in 0..37 {
        write_file(&mut fs, &format!("/many/n{i}"), &[i as u8; 3]);
    }
    assert_eq!(37usize.div_ceil(DIR_CAPACITY), fs.block_chain("/many").unwrap().len());
    assert_eq!(37 * 3, fs.list("/").unwrap()[0].size as usize);

    for i in (0..37).filter(|i| i % 3 != 0) {
        fs.delete(&format!("/many/n{i}")).unwrap();
    }
    let left = fs.list("/many").unwrap();
    assert_eq!(13, left.len());
    assert_eq!(13usize.div_ceil(DIR_CAPACITY), fs.block_chain("/many").unwrap().len());
    for i in (0..37).step_by(3) {
        assert_eq!(vec![i as u8; 3], read_file(&mut fs, &format!("/many/n{i}")));
    }
    assert_conserved(&fs);
}

#[test]
fn swap_delete_preserves_entries() {
    let (_, mut fs) = mounted(BLOCKS);
    for (i, name) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
        if i % 2 == 0 {
            write_file(&mut fs, &format!("/{name}"), &pattern(i * 50));
        } else {
            let fd = fs.mkdir(&format!("/{name}")).unwrap();
            fs.close(fd).unwrap();
        }
    }
    let before: HashMap<String, DirEntry> = fs
        .list("/")
        .unwrap()
        .into_iter()
        .map(|e| (e.name().to_owned(), e))
        .collect();

    fs.delete("/b").unwrap();
    let after = fs.list("/").unwrap();
    assert_eq!(5, after.len());
    // 最后一项被搬到了原来的位置
    assert_eq!("f", after[1].name());
    for entry in after {
        assert_eq!(before[entry.name()], entry);
    }
}

#[test]
fn cascading_delete() {
    let (_, mut fs) = mounted(BLOCKS);
    let initial = fs.free_blocks().unwrap();

    fs.mkdir("/top").unwrap();
    write_file(&mut fs, "/keep", &pattern(10));
    fs.mkdir("/top/mid").unwrap();
    write_file(&mut fs, "/top/a", &pattern(200));
    write_file(&mut fs, "/top/mid/b", &pattern(300));
    fs.mkdir("/top/mid/deep").unwrap();
    for i in 0..6 {
        write_file(&mut fs, &format!("/top/mid/deep/x{i}"), &pattern(10));
    }
    let top = fs.list("/").unwrap().into_iter().find(|e| e.name() == "top").unwrap();
    assert_eq!(200 + 300 + 60, top.size);
    let root = fs.open("/").unwrap();
    assert_eq!(570, fs.file_size(root).unwrap());

    // 删除中间层，祖先大小精确减少
    fs.delete("/top/mid").unwrap();
    let top = fs.list("/").unwrap().into_iter().find(|e| e.name() == "top").unwrap();
    assert_eq!(200, top.size);
    assert_eq!(210, fs.file_size(root).unwrap());
    assert_eq!(Err(Error::NotFound), fs.open("/top/mid/b"));

    fs.rmdir("/top").unwrap();
    assert_eq!(1, fs.list("/").unwrap().len());
    assert_eq!(initial - 1, fs.free_blocks().unwrap());
    assert_conserved(&fs);
}

#[test]
fn delete_discards_handles() {
    let (_, mut fs) = mounted(BLOCKS);
    let dir = fs.mkdir("/d").unwrap();
    let fd = fs.create("/d/f").unwrap();
    fs.write(fd, b"bytes").unwrap();

    fs.delete("/d").unwrap();
    assert_eq!(Err(Error::InvalidDescriptor), fs.write(fd, b"more"));
    assert_eq!(Err(Error::InvalidDescriptor), fs.close(dir));
    fs.unmount().unwrap();
}

#[test]
fn directory_entries() {
    let (_, mut fs) = mounted(BLOCKS);
    fs.mkdir("/sub").unwrap();
    write_file(&mut fs, "/sub/file", b"123");
    let list = fs.list("/sub").unwrap();
    assert_eq!(1, list.len());
    let entry = list[0];
    assert_eq!(EntryKind::File, entry.kind);
    assert_eq!(3, entry.size);
    assert_eq!(fs.block_chain("/sub").unwrap()[0], entry.parent);
    assert_eq!(fs.block_chain("/sub/file").unwrap()[0], entry.first);

    assert!(fs.list("/").unwrap()[0].is_dir());
    assert!(fs.list("//sub//").unwrap().len() == 1);
}

#[test]
fn conservation_under_churn() {
    let (_, mut fs) = mounted(256);
    fs.mkdir("/w").unwrap();
    for round in 0..6 {
        for i in 0..9 {
            let path = format!("/w/r{round}_{i}");
            write_file(&mut fs, &path, &pattern((round * 97 + i * 31) % 700));
        }
        assert_conserved(&fs);
        for i in (0..9).filter(|i| (i + round) % 2 == 0) {
            fs.delete(&format!("/w/r{round}_{i}")).unwrap();
        }
        assert_conserved(&fs);
    }
    fs.rmdir("/w").unwrap();
    assert_eq!(256 - 2 - 8 - 1, fs.free_blocks().unwrap());
    assert_conserved(&fs);
}
