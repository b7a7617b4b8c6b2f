use log::info;

use super::{AutomationModule, CommandOutcome};

/// 只打印命令的调试模块
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugModule;

impl AutomationModule for DebugModule {
    async fn execute_command(&self, device: &str, action: &str) -> CommandOutcome {
        info!("DEBUG MODULE: {} -> {}", device, action.to_uppercase());
        CommandOutcome::success(device, action, format!("Debug: Would turn {} {}", device, action))
    }
}
