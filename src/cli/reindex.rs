use clap::Parser;
use tokio::task::block_in_place;

use crate::DeviceStoreBuilder;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ReindexCommand {}

impl SubCommandExtend for ReindexCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let count = block_in_place(|| -> anyhow::Result<_> {
            // 特征提取器版本不一致时 open 也会重新计算，这里统一再算一遍
            let store = DeviceStoreBuilder::new(opts.conf_dir.clone()).reindex(true).open()?;
            Ok(store.reindex()?)
        })?;
        println!("[OK] {}", count);
        Ok(())
    }
}
