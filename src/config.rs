use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::matcher::DEFAULT_THRESHOLD;

fn default_conf_dir() -> ConfDir {
    let path = ProjectDirs::from("", "", "visual-assistant")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    ConfDir::new(path)
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 相似度阈值，最佳匹配的余弦相似度不低于该值时视为识别成功
    #[arg(short, long, value_name = "T", default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
    pub threshold: f32,
}

#[derive(Parser, Debug, Clone)]
pub struct AutomationOptions {
    /// 识别成功后用于执行命令的自动化模块
    #[arg(long, value_enum, default_value_t = AutomationKind::Debug)]
    pub automation: AutomationKind,
    /// HTTP 模块的设备接口配置文件，格式为 {"设备": {"动作": "URL"}}
    #[arg(long, value_name = "FILE")]
    pub http_endpoints: Option<PathBuf>,
    /// HTTP 模块的请求超时时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub http_timeout: u64,
    /// Home Assistant 服务地址
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8123")]
    pub ha_url: String,
    /// Home Assistant 长期访问令牌
    #[arg(long, value_name = "TOKEN", default_value_t = String::new())]
    pub ha_token: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationKind {
    /// 只打印命令，用于调试
    Debug,
    /// 按配置文件向设备发送 HTTP 请求
    Http,
    /// 调用 Home Assistant 的 turn_on / turn_off 服务
    HomeAssistant,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "visual-assistant", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 配置目录，保存设备库和设备图片
    #[arg(short, long, default_value_t = default_conf_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 拍照注册一个新设备
    Register(RegisterCommand),
    /// 为已有设备添加图片
    Add(AddCommand),
    /// 删除设备的一张图片，并重新计算该设备的特征
    RemoveImage(RemoveImageCommand),
    /// 重命名设备
    Rename(RenameCommand),
    /// 删除设备及其全部图片
    Delete(DeleteCommand),
    /// 列出所有设备
    List(ListCommand),
    /// 查看设备详情
    Show(ShowCommand),
    /// 识别图片中的设备，可选地执行命令
    Recognize(RecognizeCommand),
    /// 使用已保存的图片重新计算所有设备的特征
    Reindex(ReindexCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回设备库文件的路径
    pub fn devices(&self) -> PathBuf {
        self.path.join("devices.json")
    }

    /// 返回设备库文件的临时路径，写入完成后重命名为正式文件
    pub fn devices_tmp(&self) -> PathBuf {
        self.path.join("devices.json.tmp")
    }

    /// 返回设备图片的根目录
    pub fn photos(&self) -> PathBuf {
        self.path.join("device_photos")
    }

    /// 返回某个设备的图片目录
    pub fn device_dir(&self, name: &str) -> PathBuf {
        self.photos().join(name)
    }

    /// 删除设备时图片目录的临时位置，设备名不能以 `.` 开头，所以不会与设备目录冲突
    pub fn trash_dir(&self, name: &str) -> PathBuf {
        self.photos().join(format!(".{}.deleted", name))
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for ConfDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn parse_threshold(s: &str) -> anyhow::Result<f32> {
    let threshold: f32 = s.parse()?;
    if !(-1.0..=1.0).contains(&threshold) {
        return Err(anyhow::anyhow!("阈值必须在 -1 到 1 之间: {}", s));
    }
    Ok(threshold)
}
