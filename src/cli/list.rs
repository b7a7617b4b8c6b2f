use clap::Parser;

use crate::cli::{SubCommandExtend, open_store, print_json};
use crate::config::{Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        let devices = store.list();
        match self.output_format {
            OutputFormat::Json => print_json(&devices)?,
            OutputFormat::Table => {
                for device in &devices {
                    println!("{}\t{}", device.name, device.image_count);
                }
            }
        }
        Ok(())
    }
}
