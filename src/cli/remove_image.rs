use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct RemoveImageCommand {
    /// 设备名称
    pub name: String,
    /// 图片文件名，如 `image_0.jpg`
    pub image: String,
}

impl SubCommandExtend for RemoveImageCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        let record = block_in_place(|| store.delete_image(&self.name, &self.image))?;
        println!("[OK] {}\t{}", record.name, record.image_count);
        Ok(())
    }
}
