mod add;
mod delete;
mod list;
mod recognize;
mod register;
mod reindex;
mod remove_image;
mod rename;
pub mod server;
mod show;

pub use add::*;
pub use delete::*;
pub use list::*;
pub use recognize::*;
pub use register::*;
pub use reindex::*;
pub use remove_image::*;
pub use rename::*;
pub use server::*;
pub use show::*;

use serde::Serialize;
use tokio::task::block_in_place;

use crate::config::Opts;
use crate::{DeviceStore, DeviceStoreBuilder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 打开配置目录下的设备库
fn open_store(opts: &Opts) -> anyhow::Result<DeviceStore> {
    let store = block_in_place(|| DeviceStoreBuilder::new(opts.conf_dir.clone()).open())?;
    Ok(store)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
