use clap::Parser;

use crate::cli::{SubCommandExtend, open_store, print_json};
use crate::config::{Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 设备名称
    pub name: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let store = open_store(opts)?;
        let details = store.get(&self.name)?;
        match self.output_format {
            OutputFormat::Json => print_json(&details)?,
            OutputFormat::Table => {
                println!("{}\t{}", details.name, details.image_count);
                let dir = opts.conf_dir.device_dir(&details.name);
                for image in &details.images {
                    println!("{}", dir.join(image).display());
                }
            }
        }
        Ok(())
    }
}
