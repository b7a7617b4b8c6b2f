use std::path::PathBuf;

use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;
use crate::utils::{self, DEFAULT_SUFFIX};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 设备名称
    pub name: String,
    /// 新增的图片或图片所在目录
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        let paths = utils::collect_images(&self.paths, &self.suffix)?;
        info!("正在为设备 {} 添加 {} 张图片", self.name, paths.len());

        let record = block_in_place(|| -> anyhow::Result<_> {
            let images = utils::read_images(&paths)?;
            Ok(store.add_images(&self.name, &images)?)
        })?;

        println!("[OK] {}\t{}", record.name, record.image_count);
        Ok(())
    }
}
