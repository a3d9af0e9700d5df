use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// 下游渠道错误
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink rejected request with status {0}")]
    Rejected(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Sink panicked: {0}")]
    Panicked(String),
}

/// 审计存储（每条分类结果都写入）
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// 创建一条记录，返回记录 ID
    async fn create_record(
        &self,
        category: &str,
        properties: &Map<String, Value>,
    ) -> Result<String, SinkError>;
}

/// 仪表盘数据集
#[async_trait]
pub trait DashboardSink: Send + Sync {
    /// 推送数据行，返回 `false` 表示对方未接受
    async fn push_rows(&self, dataset_key: &str, rows: &[Value]) -> Result<bool, SinkError>;
}

/// 聊天通知渠道
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_alert(
        &self,
        title: &str,
        body: &str,
        severity: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<bool, SinkError>;
}
