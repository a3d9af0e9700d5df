use async_trait::async_trait;
use labwatch_core::{Incident, MetricSnapshot};
use thiserror::Error;

/// 上游数据源错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source returned status {0}")]
    Status(u16),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Source panicked: {0}")]
    Panicked(String),
}

/// 上游数据源
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// 数据源标识
    fn id(&self) -> &str;

    /// 拉取人员指标
    async fn get_metrics(&self) -> Result<Vec<MetricSnapshot>, SourceError>;

    /// 拉取事件
    async fn get_incidents(&self) -> Result<Vec<Incident>, SourceError>;
}
