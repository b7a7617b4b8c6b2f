use clap::Parser;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// 设备名称
    pub name: String,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        store.delete(&self.name)?;
        println!("[OK] {}", self.name);
        Ok(())
    }
}
