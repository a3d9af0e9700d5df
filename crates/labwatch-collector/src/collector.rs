use futures::future;
use futures::FutureExt;
use labwatch_core::{panic_message, Incident, MetricSnapshot};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::source::{MetricSource, SourceError};

/// 单个数据源在本周期的采集结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOutcome {
    pub source_id: String,
    pub metrics: Vec<MetricSnapshot>,
    pub incidents: Vec<Incident>,
    pub metrics_error: Option<String>,
    pub incidents_error: Option<String>,
}

impl SourceOutcome {
    pub fn success(&self) -> bool {
        self.metrics_error.is_none() && self.incidents_error.is_none()
    }

    /// 指标与事件两个端点都失败，本周期没有拿到任何数据
    pub fn is_down(&self) -> bool {
        self.metrics_error.is_some() && self.incidents_error.is_some()
    }
}

/// 一次采集的汇总，每个已配置的数据源各一项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorResult {
    pub outcomes: Vec<SourceOutcome>,
}

impl CollectorResult {
    pub fn get(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    pub fn metrics(&self) -> impl Iterator<Item = &MetricSnapshot> {
        self.outcomes.iter().flat_map(|o| o.metrics.iter())
    }

    pub fn incidents(&self) -> impl Iterator<Item = &Incident> {
        self.outcomes.iter().flat_map(|o| o.incidents.iter())
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success())
            .map(|o| o.source_id.as_str())
            .collect()
    }

    /// 配置了数据源且每个数据源都完全不可用
    ///
    /// 只要任一端点返回了数据，本周期就仍有可处理的内容。
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(SourceOutcome::is_down)
    }
}

/// 数据采集器
///
/// 所有数据源并行拉取；单个数据源的错误或 panic 只影响它自己的那一项。
#[derive(Clone, Default)]
pub struct DataCollector {
    sources: Vec<Arc<dyn MetricSource>>,
}

impl DataCollector {
    pub fn new(sources: Vec<Arc<dyn MetricSource>>) -> Self {
        Self { sources }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// 采集全部数据源，本身从不失败
    pub async fn collect(&self) -> CollectorResult {
        let fetches = self.sources.iter().map(|source| collect_one(source.as_ref()));
        let outcomes = future::join_all(fetches).await;
        let result = CollectorResult { outcomes };

        debug!(
            sources = result.outcomes.len(),
            failed = result.failed_sources().len(),
            "Collection finished"
        );
        result
    }
}

async fn collect_one(source: &dyn MetricSource) -> SourceOutcome {
    let id = source.id().to_string();
    let (metrics, incidents) = tokio::join!(
        guarded(&id, "metrics", source.get_metrics()),
        guarded(&id, "incidents", source.get_incidents()),
    );

    let (metrics, metrics_error) = split(metrics);
    let (incidents, incidents_error) = split(incidents);
    SourceOutcome {
        source_id: id,
        metrics,
        incidents,
        metrics_error,
        incidents_error,
    }
}

async fn guarded<T, F>(source: &str, kind: &str, fetch: F) -> Result<Vec<T>, SourceError>
where
    F: Future<Output = Result<Vec<T>, SourceError>>,
{
    let result = match AssertUnwindSafe(fetch).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(SourceError::Panicked(panic_message(panic.as_ref()))),
    };

    if let Err(e) = &result {
        warn!(source = %source, kind, error = %e, "Source fetch failed");
    }
    result
}

fn split<T>(result: Result<Vec<T>, SourceError>) -> (Vec<T>, Option<String>) {
    match result {
        Ok(items) => (items, None),
        Err(e) => (Vec::new(), Some(e.to_string())),
    }
}
