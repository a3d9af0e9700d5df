use async_trait::async_trait;
use labwatch_collector::{DataCollector, HttpSource, MetricSource};
use labwatch_config::LabwatchConfig;
use labwatch_notify::{
    AuditSink, ChatSink, DashboardSink, HttpAuditSink, HttpDashboardSink, SinkFanout, SinkSet,
    WebhookChatSink,
};
use std::sync::Arc;
use tracing::info;

/// 一组可替换的上下游客户端
pub struct ClientSet {
    pub collector: DataCollector,
    pub fanout: SinkFanout,
}

/// 客户端工厂，调度器启动和自愈重载时调用
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn build_clients(&self) -> anyhow::Result<ClientSet>;
}

/// 根据配置构建 HTTP 客户端
pub struct HttpClientProvider {
    config: LabwatchConfig,
}

impl HttpClientProvider {
    pub fn new(config: LabwatchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClientProvider for HttpClientProvider {
    async fn build_clients(&self) -> anyhow::Result<ClientSet> {
        let sources: Vec<Arc<dyn MetricSource>> = self
            .config
            .sources
            .iter()
            .map(|s| {
                Arc::new(HttpSource::new(&s.id, &s.base_url, s.api_token.clone()))
                    as Arc<dyn MetricSource>
            })
            .collect();

        let sinks_config = &self.config.sinks;
        let sinks = SinkSet {
            audit: sinks_config.audit_url.as_ref().map(|url| {
                Arc::new(HttpAuditSink::new(url, sinks_config.audit_token.clone()))
                    as Arc<dyn AuditSink>
            }),
            dashboard: sinks_config
                .dashboard_url
                .as_ref()
                .map(|url| Arc::new(HttpDashboardSink::new(url)) as Arc<dyn DashboardSink>),
            chat: sinks_config
                .chat_webhook_url
                .as_ref()
                .map(|url| Arc::new(WebhookChatSink::new(url)) as Arc<dyn ChatSink>),
        };

        info!(
            sources = sources.len(),
            audit = sinks.audit.is_some(),
            dashboard = sinks.dashboard.is_some(),
            chat = sinks.chat.is_some(),
            "Clients built"
        );

        Ok(ClientSet {
            collector: DataCollector::new(sources),
            fanout: SinkFanout::new(
                sinks,
                sinks_config.audit_category.clone(),
                sinks_config.dashboard_dataset.clone(),
            ),
        })
    }
}
