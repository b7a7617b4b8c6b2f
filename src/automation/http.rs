use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use anyhow::Context;
use log::debug;
use reqwest::{Client, StatusCode};

use super::{AutomationModule, CommandOutcome};
use crate::config::AutomationOptions;

/// 设备名（小写）到 {动作: URL} 的映射
pub type Endpoints = HashMap<String, HashMap<String, String>>;

/// 通过 GET 请求控制设备的通用 HTTP 模块
#[derive(Debug, Clone)]
pub struct HttpModule {
    client: Client,
    endpoints: Endpoints,
}

impl HttpModule {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> anyhow::Result<Self> {
        let endpoints = endpoints.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    pub fn from_options(opts: &AutomationOptions) -> anyhow::Result<Self> {
        let path = opts.http_endpoints.as_ref().context("HTTP 模块需要 --http-endpoints 配置文件")?;
        let data = fs::read(path).with_context(|| format!("无法读取 {}", path.display()))?;
        let endpoints: Endpoints = serde_json::from_slice(&data)
            .with_context(|| format!("无法解析 {}", path.display()))?;
        Self::new(endpoints, Duration::from_secs(opts.http_timeout))
    }
}

impl AutomationModule for HttpModule {
    async fn execute_command(&self, device: &str, action: &str) -> CommandOutcome {
        let Some(actions) = self.endpoints.get(&device.to_lowercase()) else {
            let message = format!("Device '{}' not configured in HTTP module", device);
            return CommandOutcome::failure(device, action, message);
        };
        let Some(url) = actions.get(action) else {
            let message = format!("Action '{}' not configured for device '{}'", action, device);
            return CommandOutcome::failure(device, action, message);
        };

        debug!("GET {}", url);
        match self.client.get(url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => {
                CommandOutcome::success(device, action, format!("Successfully turned {} {}", device, action))
                    .with_status(StatusCode::OK.as_u16())
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                CommandOutcome::failure(device, action, format!("HTTP request failed with status {}", status))
                    .with_status(status)
            }
            Err(e) if e.is_timeout() => {
                CommandOutcome::failure(device, action, format!("Request to {} timed out", device))
            }
            Err(e) if e.is_connect() => {
                CommandOutcome::failure(device, action, format!("Could not connect to {}", device))
            }
            Err(e) => {
                CommandOutcome::failure(device, action, format!("Error controlling {}: {}", device, e))
            }
        }
    }
}
