use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::sink::{AuditSink, ChatSink, DashboardSink, SinkError};

// ============================================================================
// 审计存储（HTTP JSON）
// ============================================================================

/// 以 `POST {"category", "properties"}` 创建记录，响应体需包含 `id`
pub struct HttpAuditSink {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpAuditSink {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn create_record(
        &self,
        category: &str,
        properties: &Map<String, Value>,
    ) -> Result<String, SinkError> {
        let mut request = self.client.post(&self.url).json(&serde_json::json!({
            "category": category,
            "properties": properties,
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }

        let body: Value = response.json().await?;
        parse_record_id(&body)
    }
}

fn parse_record_id(body: &Value) -> Result<String, SinkError> {
    match body.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SinkError::InvalidResponse(
            "audit response has no record id".to_string(),
        )),
    }
}

// ============================================================================
// 仪表盘推送数据集
// ============================================================================

/// 以 `POST {base}/{dataset}/rows` 推送 `{"rows": [...]}`
pub struct HttpDashboardSink {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDashboardSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn rows_url(&self, dataset_key: &str) -> String {
        format!("{}/{}/rows", self.base_url.trim_end_matches('/'), dataset_key)
    }
}

#[async_trait]
impl DashboardSink for HttpDashboardSink {
    async fn push_rows(&self, dataset_key: &str, rows: &[Value]) -> Result<bool, SinkError> {
        let response = self
            .client
            .post(self.rows_url(dataset_key))
            .json(&serde_json::json!({ "rows": rows }))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

// ============================================================================
// 聊天 Webhook（MessageCard）
// ============================================================================

pub struct WebhookChatSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookChatSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn build_message(
        &self,
        title: &str,
        body: &str,
        severity: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Value {
        let color = match severity {
            "critical" | "high" => "D13438",
            "medium" | "warning" => "FFA500",
            "compliance" => "8764B8",
            _ => "0078D7",
        };
        let facts: Vec<Value> = metadata
            .iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect();

        serde_json::json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "themeColor": color,
            "summary": title,
            "title": title,
            "text": body.replace('\n', "<br>"),
            "sections": [{ "facts": facts }],
        })
    }
}

#[async_trait]
impl ChatSink for WebhookChatSink {
    async fn send_alert(
        &self,
        title: &str,
        body: &str,
        severity: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<bool, SinkError> {
        let message = self.build_message(title, body, severity, metadata);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        if response.status().is_success() {
            info!(title = %title, "Chat notification sent");
            Ok(true)
        } else {
            Err(SinkError::Rejected(response.status().as_u16()))
        }
    }
}
