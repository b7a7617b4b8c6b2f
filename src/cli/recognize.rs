use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::RecognitionEngine;
use crate::automation::Automation;
use crate::cli::{SubCommandExtend, open_store, print_json};
use crate::config::{AutomationOptions, MatchOptions, Opts, OutputFormat};
use crate::engine::{CommandReport, VISUAL_TARGET};
use crate::matcher::{MatchResult, Matcher};

#[derive(Parser, Debug, Clone)]
pub struct RecognizeCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    #[command(flatten)]
    pub automation: AutomationOptions,
    /// 需要识别的图片路径
    pub image: PathBuf,
    /// 期望的设备名，默认接受任何识别结果
    #[arg(short, long, default_value = VISUAL_TARGET)]
    pub device: String,
    /// 识别成功后执行的动作，如 `on`、`off`，不填则只输出识别结果
    #[arg(short, long)]
    pub action: Option<String>,
    /// 输出所有设备的相似度
    #[arg(long, conflicts_with = "action")]
    pub all: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for RecognizeCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let image = fs::read(&self.image)
            .with_context(|| format!("无法读取图片: {}", self.image.display()))?;
        let store = open_store(opts)?;
        let engine = RecognitionEngine::new(
            store,
            Matcher::new(self.matching.threshold),
            Automation::from_options(&self.automation),
        );

        if self.all {
            let ranking = block_in_place(|| engine.rank(&image))?;
            return print_ranking(&ranking, self.output_format);
        }

        let Some(action) = &self.action else {
            let result = block_in_place(|| engine.recognize(&image))?;
            return print_match(&result, self.output_format);
        };

        info!("识别 {} 并执行 {} -> {}", self.image.display(), self.device, action);
        let report = engine.recognize_and_resolve(&image, &self.device, action).await?;
        print_report(&report, self.output_format)?;
        if !report.outcome.success {
            anyhow::bail!("命令未执行: {}", report.resolution.kind());
        }
        Ok(())
    }
}

fn print_ranking(ranking: &[(f32, String)], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(ranking)?,
        OutputFormat::Table => {
            for (score, name) in ranking {
                println!("{:.2}\t{}", score, name);
            }
        }
    }
    Ok(())
}

fn print_match(result: &MatchResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            let device = result.device.as_deref().unwrap_or("-");
            println!("{:.2}\t{}", result.confidence, device);
        }
    }
    Ok(())
}

fn print_report(report: &CommandReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => println!("{}", report.outcome.message),
    }
    Ok(())
}
