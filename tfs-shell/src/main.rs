mod block_file;
mod cli;
mod shell;

use std::io;
use std::sync::Arc;

use clap::Parser;
use tfs::{BlockDevice, Tfs};
use typed_bytesize::ByteSizeIec;

pub use self::{block_file::BlockFile, cli::Cli, shell::Shell};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    log::info!("image={:?} blocks={}", cli.image, cli.blocks);

    // 镜像已存在就直接打开，否则留给 mkfs 创建
    let tfs = if cli.image.exists() {
        let file = BlockFile::open(&cli.image)?;
        log::info!(
            "opened {:?}: {} blocks, {}",
            cli.image,
            file.num_blocks(),
            ByteSizeIec(file.size())
        );
        Tfs::with_device(Arc::new(file))
    } else {
        Tfs::new()
    };

    let image = cli.image.clone();
    let mut shell = Shell::new(tfs, cli.blocks, move |blocks| {
        let file = BlockFile::create(&image, blocks)?;
        log::info!("created {:?}: {}", image, ByteSizeIec(file.size()));
        Ok(Arc::new(file) as Arc<dyn BlockDevice>)
    });

    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    shell.run(stdin, &mut stdout)
}
