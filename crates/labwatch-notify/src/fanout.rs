use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use labwatch_alert::CooldownStore;
use labwatch_core::{panic_message, ClassifiedAlert, MetricSnapshot, SinkResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::sink::{AuditSink, ChatSink, DashboardSink, SinkError};

pub const AUDIT_SINK: &str = "audit";
pub const DASHBOARD_SINK: &str = "dashboard";
pub const CHAT_SINK: &str = "chat";

/// 一组下游渠道，未配置的渠道为 `None`
#[derive(Clone, Default)]
pub struct SinkSet {
    pub audit: Option<Arc<dyn AuditSink>>,
    pub dashboard: Option<Arc<dyn DashboardSink>>,
    pub chat: Option<Arc<dyn ChatSink>>,
}

/// 一次分发的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutReport {
    pub results: HashMap<String, SinkResult>,
    /// 聊天通知是否被冷却抑制
    pub chat_suppressed: bool,
}

impl FanoutReport {
    /// 至少一个渠道成功
    pub fn succeeded(&self) -> bool {
        self.results.values().any(|r| r.success)
    }

    pub fn attempted(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn get(&self, sink: &str) -> Option<&SinkResult> {
        self.results.get(sink)
    }
}

/// 分发器：每个渠道独立投递，单个失败不影响其他渠道
pub struct SinkFanout {
    sinks: SinkSet,
    audit_category: String,
    dataset_key: String,
}

impl SinkFanout {
    pub fn new(
        sinks: SinkSet,
        audit_category: impl Into<String>,
        dataset_key: impl Into<String>,
    ) -> Self {
        Self {
            sinks,
            audit_category: audit_category.into(),
            dataset_key: dataset_key.into(),
        }
    }

    /// 投递一条分类结果
    ///
    /// 审计渠道总是写入；带指标时推送仪表盘；Medium 及以上且冷却放行时才发聊天通知。
    pub async fn deliver(
        &self,
        alert: &ClassifiedAlert,
        cooldown: &mut dyn CooldownStore,
        now: DateTime<Utc>,
    ) -> FanoutReport {
        let mut attempts: Vec<BoxFuture<'_, SinkResult>> = Vec::new();
        let mut chat_suppressed = false;

        if let Some(audit) = &self.sinks.audit {
            let properties = audit_properties(alert);
            let category = self.audit_category.clone();
            attempts.push(
                attempt(AUDIT_SINK, async move {
                    let id = audit.create_record(&category, &properties).await?;
                    debug!(record_id = %id, "Audit record created");
                    Ok(true)
                })
                .boxed(),
            );
        }

        if let (Some(dashboard), Some(_)) = (&self.sinks.dashboard, &alert.source_event.metrics) {
            let rows = vec![dashboard_row(alert)];
            let dataset = self.dataset_key.clone();
            attempts.push(
                attempt(DASHBOARD_SINK, async move {
                    dashboard.push_rows(&dataset, &rows).await
                })
                .boxed(),
            );
        }

        if let Some(chat) = &self.sinks.chat {
            if alert.priority.notifies_chat() {
                let key = alert.cooldown_key();
                if cooldown.check_and_record(&key, now) {
                    let title = alert.title();
                    let body = chat_body(alert);
                    let metadata = chat_metadata(alert);
                    let severity = alert.priority.as_str();
                    attempts.push(
                        attempt(CHAT_SINK, async move {
                            chat.send_alert(&title, &body, severity, &metadata).await
                        })
                        .boxed(),
                    );
                } else {
                    debug!(key = %key, "Chat notification suppressed by cooldown");
                    chat_suppressed = true;
                }
            }
        }

        let results = future::join_all(attempts).await;
        let report = FanoutReport {
            results: results
                .into_iter()
                .map(|r| (r.sink_name.clone(), r))
                .collect(),
            chat_suppressed,
        };

        if report.attempted() && !report.succeeded() {
            warn!(
                destination = %alert.destination,
                priority = %alert.priority,
                "All sinks failed for alert"
            );
        }

        report
    }

    /// 把本周期采集到的指标整体推送到仪表盘
    pub async fn publish_metrics(&self, snapshots: &[MetricSnapshot]) -> Option<SinkResult> {
        let dashboard = self.sinks.dashboard.as_ref()?;
        if snapshots.is_empty() {
            return None;
        }

        let rows: Vec<Value> = snapshots.iter().map(MetricSnapshot::to_row).collect();
        let result = attempt(DASHBOARD_SINK, dashboard.push_rows(&self.dataset_key, &rows)).await;
        if result.success {
            info!(rows = rows.len(), dataset = %self.dataset_key, "Published metrics to dashboard");
        }
        Some(result)
    }

    /// 系统通知（启动、致命错误），不经过冷却
    pub async fn notify_system(&self, title: &str, body: &str, severity: &str) -> Option<SinkResult> {
        let chat = self.sinks.chat.as_ref()?;
        let mut metadata = BTreeMap::new();
        metadata.insert("category".to_string(), "system".to_string());
        Some(attempt(CHAT_SINK, chat.send_alert(title, body, severity, &metadata)).await)
    }
}

/// 执行一次渠道调用，把错误和 panic 都转换成 `SinkResult`
async fn attempt<F>(sink: &'static str, call: F) -> SinkResult
where
    F: Future<Output = Result<bool, SinkError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(true)) => SinkResult::success(sink),
        Ok(Ok(false)) => {
            warn!(sink, "Sink declined delivery");
            SinkResult::failure(sink, "sink declined delivery")
        }
        Ok(Err(e)) => {
            warn!(sink, error = %e, "Sink delivery failed");
            SinkResult::failure(sink, e.to_string())
        }
        Err(panic) => {
            let e = SinkError::Panicked(panic_message(panic.as_ref()));
            warn!(sink, error = %e, "Sink delivery failed");
            SinkResult::failure(sink, e.to_string())
        }
    }
}

fn audit_properties(alert: &ClassifiedAlert) -> Map<String, Value> {
    let event = &alert.source_event;
    let mut properties = Map::new();
    properties.insert("title".into(), Value::String(alert.title()));
    properties.insert("message".into(), Value::String(event.raw_message.clone()));
    properties.insert("destination".into(), Value::String(alert.destination.to_string()));
    properties.insert("priority".into(), Value::String(alert.priority.to_string()));
    properties.insert("department".into(), Value::String(alert.department.to_string()));
    properties.insert("matched_keyword".into(), Value::String(alert.matched_keyword.clone()));
    properties.insert("timestamp".into(), Value::String(event.timestamp.to_rfc3339()));
    if let Some(subject) = &event.subject {
        properties.insert("subject".into(), Value::String(subject.clone()));
    }
    if let Some(incident) = &event.incident {
        properties.insert("incident_id".into(), Value::String(incident.incident_id.clone()));
        properties.insert(
            "incident_status".into(),
            serde_json::to_value(incident.status).unwrap_or(Value::Null),
        );
        properties.insert("incident_type".into(), Value::String(incident.kind.clone()));
    }
    if let Some(metrics) = &event.metrics {
        properties.insert(
            "metrics".into(),
            serde_json::to_value(metrics).unwrap_or(Value::Null),
        );
    }
    properties
}

fn dashboard_row(alert: &ClassifiedAlert) -> Value {
    let event = &alert.source_event;
    let mut row = serde_json::json!({
        "timestamp": event.timestamp.to_rfc3339(),
        "destination": alert.destination.as_str(),
        "priority": alert.priority.as_str(),
        "department": alert.department.as_str(),
        "subject": event.subject,
    });
    if let (Some(metrics), Value::Object(map)) = (&event.metrics, &mut row) {
        if let Ok(Value::Object(readings)) = serde_json::to_value(metrics) {
            map.extend(readings);
        }
    }
    row
}

fn chat_body(alert: &ClassifiedAlert) -> String {
    let mut body = alert.source_event.raw_message.clone();
    body.push_str(&format!(
        "\n\nDepartment: {}\nMatched: {}",
        alert.department, alert.matched_keyword
    ));
    body
}

fn chat_metadata(alert: &ClassifiedAlert) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("destination".to_string(), alert.destination.to_string());
    metadata.insert("department".to_string(), alert.department.to_string());
    metadata.insert("priority".to_string(), alert.priority.to_string());
    if let Some(subject) = &alert.source_event.subject {
        metadata.insert("subject".to_string(), subject.clone());
    }
    metadata
}
