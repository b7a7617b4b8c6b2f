use std::time::Duration;

use anyhow::bail;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::json;

use super::{AutomationModule, CommandOutcome};
use crate::config::AutomationOptions;

/// 通过 Home Assistant REST API 控制设备，设备名即实体 ID
#[derive(Debug, Clone)]
pub struct HomeAssistantModule {
    client: Client,
    url: String,
    token: String,
}

impl HomeAssistantModule {
    pub fn new(url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.trim_end_matches('/').to_owned(), token: token.to_owned() })
    }

    pub fn from_options(opts: &AutomationOptions) -> anyhow::Result<Self> {
        if opts.ha_token.is_empty() {
            bail!("Home Assistant 模块需要 --ha-token");
        }
        Self::new(&opts.ha_url, &opts.ha_token, Duration::from_secs(opts.http_timeout))
    }

    fn service_url(&self, action: &str) -> String {
        let service = if action == "on" { "turn_on" } else { "turn_off" };
        format!("{}/api/services/homeassistant/{}", self.url, service)
    }
}

impl AutomationModule for HomeAssistantModule {
    async fn execute_command(&self, device: &str, action: &str) -> CommandOutcome {
        let url = self.service_url(action);
        debug!("POST {} entity_id={}", url, device);
        let result = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "entity_id": device }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                CommandOutcome::success(device, action, format!("Successfully turned {} {}", device, action))
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let text = resp.text().await.unwrap_or_default();
                CommandOutcome::failure(device, action, format!("Failed to control {}: {}", device, text))
                    .with_status(status)
            }
            Err(e) => {
                CommandOutcome::failure(device, action, format!("Error controlling {}: {}", device, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use tokio::net::TcpListener;

    use super::*;

    type Calls = Arc<Mutex<Vec<(String, String, Value)>>>;

    async fn serve(calls: Calls) -> String {
        async fn handler(
            State(calls): State<Calls>,
            axum::extract::Path(service): axum::extract::Path<String>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> AxumStatus {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let forbidden = body["entity_id"] == "light.locked";
            calls.lock().unwrap().push((service, auth, body));
            if forbidden { AxumStatus::FORBIDDEN } else { AxumStatus::OK }
        }

        let app = Router::new()
            .route("/api/services/homeassistant/{service}", post(handler))
            .with_state(calls);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_service_url() {
        let module = HomeAssistantModule::new("http://ha:8123/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(module.service_url("on"), "http://ha:8123/api/services/homeassistant/turn_on");
        assert_eq!(module.service_url("off"), "http://ha:8123/api/services/homeassistant/turn_off");
        assert_eq!(module.service_url("toggle"), "http://ha:8123/api/services/homeassistant/turn_off");
    }

    #[tokio::test]
    async fn test_execute_command() {
        let calls = Calls::default();
        let url = serve(calls.clone()).await;
        let module = HomeAssistantModule::new(&url, "secret", Duration::from_secs(5)).unwrap();

        let outcome = module.execute_command("light.kitchen", "on").await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Successfully turned light.kitchen on");

        let outcome = module.execute_command("light.locked", "off").await;
        assert!(!outcome.success);
        assert_eq!(outcome.http_status, Some(403));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "turn_on");
        assert_eq!(calls[0].1, "Bearer secret");
        assert_eq!(calls[0].2["entity_id"], "light.kitchen");
        assert_eq!(calls[1].0, "turn_off");
    }
}
