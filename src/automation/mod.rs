//! 自动化模块：接收识别出的设备名和动作，执行实际的控制操作
//!
//! 模块的执行结果，包括失败，都作为数据原样返回给调用方，不会转换为引擎错误。

mod debug;
mod home_assistant;
mod http;

use std::future::Future;

use log::{error, info};
use serde::{Deserialize, Serialize};

pub use self::debug::DebugModule;
pub use self::home_assistant::HomeAssistantModule;
pub use self::http::{Endpoints, HttpModule};
use crate::config::{AutomationKind, AutomationOptions};

/// 自动化模块的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub device: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl CommandOutcome {
    pub fn success(device: &str, action: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            device: device.to_owned(),
            action: action.to_owned(),
            http_status: None,
        }
    }

    pub fn failure(device: &str, action: &str, message: impl Into<String>) -> Self {
        Self { success: false, ..Self::success(device, action, message) }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

pub trait AutomationModule {
    fn execute_command(
        &self,
        device: &str,
        action: &str,
    ) -> impl Future<Output = CommandOutcome> + Send;
}

/// 启动时根据配置选择的自动化模块
#[derive(Debug, Clone)]
pub enum Automation {
    Debug(DebugModule),
    Http(HttpModule),
    HomeAssistant(HomeAssistantModule),
}

impl Automation {
    /// 根据配置创建自动化模块，创建失败时回退到 debug 模块
    pub fn from_options(opts: &AutomationOptions) -> Self {
        let result = match opts.automation {
            AutomationKind::Debug => Ok(Self::Debug(DebugModule)),
            AutomationKind::Http => HttpModule::from_options(opts).map(Self::Http),
            AutomationKind::HomeAssistant => {
                HomeAssistantModule::from_options(opts).map(Self::HomeAssistant)
            }
        };
        match result {
            Ok(module) => {
                info!("自动化模块: {}", module.name());
                module
            }
            Err(e) => {
                error!("无法加载自动化模块 {:?}: {:#}，使用 debug 模块", opts.automation, e);
                Self::Debug(DebugModule)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug(_) => "debug",
            Self::Http(_) => "http",
            Self::HomeAssistant(_) => "home-assistant",
        }
    }
}

impl Default for Automation {
    fn default() -> Self {
        Self::Debug(DebugModule)
    }
}

impl AutomationModule for Automation {
    async fn execute_command(&self, device: &str, action: &str) -> CommandOutcome {
        match self {
            Self::Debug(module) => module.execute_command(device, action).await,
            Self::Http(module) => module.execute_command(device, action).await,
            Self::HomeAssistant(module) => module.execute_command(device, action).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Args {
        #[command(flatten)]
        automation: AutomationOptions,
    }

    fn options(args: &[&str]) -> AutomationOptions {
        Args::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .unwrap()
            .automation
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = CommandOutcome::failure("tv", "on", "boom");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], false);
        assert!(value.get("http_status").is_none());

        let value = serde_json::to_value(outcome.with_status(503)).unwrap();
        assert_eq!(value["http_status"], 503);
    }

    #[test]
    fn test_select_debug_by_default() {
        assert_eq!(Automation::from_options(&options(&[])).name(), "debug");
    }

    #[test]
    fn test_fallback_to_debug() {
        // 缺少接口配置文件
        let opts = options(&["--automation", "http"]);
        assert_eq!(Automation::from_options(&opts).name(), "debug");
        // 缺少访问令牌
        let opts = options(&["--automation", "home-assistant"]);
        assert_eq!(Automation::from_options(&opts).name(), "debug");
    }

    #[test]
    fn test_select_home_assistant() {
        let opts = options(&["--automation", "home-assistant", "--ha-token", "secret"]);
        assert_eq!(Automation::from_options(&opts).name(), "home-assistant");
    }

    #[tokio::test]
    async fn test_dispatch() {
        let outcome = Automation::default().execute_command("lamp", "off").await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Debug: Would turn lamp off");
    }
}
