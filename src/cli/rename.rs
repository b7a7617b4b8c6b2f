use clap::Parser;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct RenameCommand {
    /// 原设备名称
    pub old: String,
    /// 新设备名称
    pub new: String,
}

impl SubCommandExtend for RenameCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        store.rename(&self.old, &self.new)?;
        println!("[OK] {} -> {}", self.old, self.new);
        Ok(())
    }
}
