use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::BackendConfig;

/// Canned replies used when the backend cannot produce one. The relay never
/// surfaces backend errors to the end user as protocol errors.
const REPLY_BACKEND_ERROR: &str = "Xin lỗi, tôi gặp sự cố kỹ thuật. Vui lòng thử lại sau.";
const REPLY_BACKEND_UNREACHABLE: &str =
    "Xin lỗi, tôi không thể kết nối đến hệ thống. Vui lòng thử lại sau.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    customer_id: i64,
    persona: &'a str,
    session_id: &'a str,
    message: &'a str,
    current_date: String,
    timezone: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
}

/// Weekly savings figures from the backend dashboard, used to annotate
/// spend notifications.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub recommended_weekly_save: Option<f64>,
    pub weekly_cap_save: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DashboardResponse {
    #[serde(default)]
    summary: PlanSummary,
}

/// Client for the backend chat service (customer-facing conversational API)
pub struct BackendClient {
    client: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self { client, config })
    }

    /// Ask the backend for a reply to one user message.
    ///
    /// Infallible by design: any HTTP or transport failure degrades to a
    /// canned apology so the relay pipeline keeps going.
    pub async fn reply(
        &self,
        customer_id: i64,
        session_id: &str,
        message: &str,
        persona: &str,
    ) -> String {
        let request = ChatRequest {
            customer_id,
            persona,
            session_id,
            message,
            current_date: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            timezone: &self.config.timezone,
        };

        let url = format!("{}/chat/reply", self.config.base_url);
        debug!("Calling backend chat API: {}", url);

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("Error calling backend chat API: {}", e);
                return REPLY_BACKEND_UNREACHABLE.to_string();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Backend chat API error: {} - {}", status, body);
            return REPLY_BACKEND_ERROR.to_string();
        }

        match response.json::<ChatResponse>().await {
            Ok(chat) => chat.reply,
            Err(e) => {
                error!("Failed to parse backend chat response: {}", e);
                REPLY_BACKEND_ERROR.to_string()
            }
        }
    }

    /// Probe backend reachability for the bridge's own health endpoint.
    /// Returns "ok", "error" (non-2xx) or "unreachable".
    pub async fn health(&self) -> &'static str {
        let url = format!("{}/health", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => "ok",
            Ok(_) => "error",
            Err(_) => "unreachable",
        }
    }

    /// Fetch the customer's savings-plan summary. `None` when the dashboard
    /// is unavailable; the spend trigger degrades to an unannotated message.
    pub async fn plan_summary(&self, customer_id: i64) -> Option<PlanSummary> {
        let url = format!("{}/dashboard/todo", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("customerId", customer_id)])
            .timeout(Duration::from_secs(8))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response
            .json::<DashboardResponse>()
            .await
            .ok()
            .map(|d| d.summary)
    }

    pub fn persona(&self) -> &str {
        &self.config.persona
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn unreachable_config() -> BackendConfig {
        BackendConfig {
            // Nothing listens here; connections are refused immediately.
            base_url: "http://127.0.0.1:9".to_string(),
            persona: "Angry Mom".to_string(),
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            timeout_secs: 2,
            default_customer_id: 1,
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_canned_reply() {
        let client = BackendClient::new(unreachable_config()).unwrap();
        let reply = client.reply(1, "zalo_U1", "hello", "Angry Mom").await;
        assert_eq!(reply, REPLY_BACKEND_UNREACHABLE);
    }

    #[tokio::test]
    async fn test_unreachable_backend_reports_health() {
        let client = BackendClient::new(unreachable_config()).unwrap();
        assert_eq!(client.health().await, "unreachable");
    }

    #[tokio::test]
    async fn test_unreachable_dashboard_yields_none() {
        let client = BackendClient::new(unreachable_config()).unwrap();
        assert!(client.plan_summary(1).await.is_none());
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            customer_id: 1,
            persona: "Angry Mom",
            session_id: "zalo_U1",
            message: "Hello",
            current_date: "2025-01-17T10:00:00Z".to_string(),
            timezone: "Asia/Ho_Chi_Minh",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["customerId"], 1);
        assert_eq!(value["sessionId"], "zalo_U1");
        assert_eq!(value["currentDate"], "2025-01-17T10:00:00Z");
        assert_eq!(value["persona"], "Angry Mom");
        assert_eq!(value["timezone"], "Asia/Ho_Chi_Minh");
        assert_eq!(value["message"], "Hello");
    }
}
