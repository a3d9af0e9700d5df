use crate::error::{CycleError, SchedulerError};
use crate::events::{metric_event, EscalationLedger};
use crate::metrics::SchedulerMetrics;
use crate::provider::ClientProvider;
use chrono::Utc;
use futures::FutureExt;
use labwatch_alert::{AlertClassifier, CooldownCache, CooldownStore};
use labwatch_collector::DataCollector;
use labwatch_config::LabwatchConfig;
use labwatch_core::{panic_message, AlertEvent, ClassifiedAlert, MetricSnapshot};
use labwatch_notify::{FanoutReport, SinkFanout, DASHBOARD_SINK};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// 已请求停止，等待当前周期结束
    Stopping,
    Stopped,
}

/// 调度器控制句柄，可在其他任务中请求停止
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Arc<RwLock<SchedulerState>>,
    stop: Arc<Notify>,
}

impl SchedulerHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            stop: Arc::new(Notify::new()),
        }
    }

    /// 请求停止；不会打断正在执行的周期
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        match *state {
            SchedulerState::Running => {
                info!("Stop requested, finishing current cycle");
                *state = SchedulerState::Stopping;
                self.stop.notify_one();
            }
            SchedulerState::Idle => *state = SchedulerState::Stopped,
            SchedulerState::Stopping | SchedulerState::Stopped => {}
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub async fn is_stop_requested(&self) -> bool {
        matches!(
            self.state().await,
            SchedulerState::Stopping | SchedulerState::Stopped
        )
    }

    /// 可被停止请求唤醒的睡眠，返回 `false` 表示已请求停止
    async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_stop_requested().await;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stop.notified() => false,
        }
    }

    async fn set(&self, next: SchedulerState) {
        *self.state.write().await = next;
    }
}

/// 一条分类结果及其投递情况
#[derive(Debug, Clone)]
pub struct ProcessedAlert {
    pub alert: ClassifiedAlert,
    pub report: FanoutReport,
}

/// 单个成功周期的汇总
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub sources: usize,
    pub failed_sources: Vec<String>,
    pub snapshots: usize,
    pub incidents: usize,
    pub events: usize,
    pub alerts: Vec<ProcessedAlert>,
    /// `None` 表示未配置仪表盘或没有数据
    pub metrics_published: Option<bool>,
    pub pruned_cooldowns: usize,
}

impl CycleReport {
    pub fn suppressed(&self) -> usize {
        self.alerts
            .iter()
            .filter(|p| p.report.chat_suppressed)
            .count()
    }
}

/// `run_once` 的结果；周期失败不会作为错误向上传播
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Failed(CycleError),
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }
}

/// 监控调度器
///
/// 串行执行采集、分类、冷却、分发；连续失败达到阈值后重建所有客户端。
/// 任意时刻只有一个周期在执行，冷却缓存和失败计数只由这里修改。
pub struct MonitoringScheduler {
    config: LabwatchConfig,
    provider: Arc<dyn ClientProvider>,
    collector: DataCollector,
    fanout: SinkFanout,
    classifier: AlertClassifier,
    cooldown: Box<dyn CooldownStore>,
    escalations: EscalationLedger,
    consecutive_failures: u32,
    metrics: SchedulerMetrics,
    handle: SchedulerHandle,
}

impl MonitoringScheduler {
    /// 创建调度器并构建第一组客户端
    pub async fn new(
        config: &LabwatchConfig,
        provider: Arc<dyn ClientProvider>,
    ) -> Result<Self, SchedulerError> {
        let clients = provider
            .build_clients()
            .await
            .map_err(SchedulerError::ClientBuild)?;

        Ok(Self {
            classifier: AlertClassifier::new(&config.classifier, &config.thresholds),
            cooldown: Box::new(CooldownCache::new(config.monitoring.cooldown())),
            escalations: EscalationLedger::new(),
            config: config.clone(),
            provider,
            collector: clients.collector,
            fanout: clients.fanout,
            consecutive_failures: 0,
            metrics: SchedulerMetrics::new()?,
            handle: SchedulerHandle::new(),
        })
    }

    /// 替换冷却存储，例如多实例部署时的外部存储
    pub fn with_cooldown_store(mut self, store: Box<dyn CooldownStore>) -> Self {
        self.cooldown = store;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn escalations(&self) -> &EscalationLedger {
        &self.escalations
    }

    /// 运行监控循环，直到收到停止请求或发生致命错误
    ///
    /// 启动前已被停止时直接返回 `Ok(())`；重复启动正在运行的调度器返回 `InvalidState`。
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        {
            let mut state = self.handle.state.write().await;
            match *state {
                SchedulerState::Idle => *state = SchedulerState::Running,
                SchedulerState::Stopped => {
                    info!("Stop already requested, monitoring loop not started");
                    return Ok(());
                }
                SchedulerState::Running | SchedulerState::Stopping => {
                    return Err(SchedulerError::InvalidState(*state));
                }
            }
        }

        info!(
            interval_secs = self.config.monitoring.monitoring_interval_seconds,
            sources = self.collector.source_count(),
            "Monitoring scheduler started"
        );
        self.fanout
            .notify_system(
                "Lab monitoring started",
                &format!(
                    "Monitoring {} sources every {} seconds",
                    self.collector.source_count(),
                    self.config.monitoring.monitoring_interval_seconds
                ),
                "info",
            )
            .await;

        let result = self.run_loop().await;

        if let Err(e) = &result {
            error!(error = %e, "Monitoring loop terminated");
            let notified = self
                .fanout
                .notify_system(
                    "Lab monitoring stopped",
                    &format!("Monitoring loop terminated: {}", e),
                    "critical",
                )
                .await;
            if let Some(r) = notified.filter(|r| !r.success) {
                warn!(error = ?r.error, "Failed to send critical notification");
            }
        }

        self.handle.set(SchedulerState::Stopped).await;
        info!("Monitoring scheduler stopped");
        result
    }

    async fn run_loop(&mut self) -> Result<(), SchedulerError> {
        let interval = self.config.monitoring.interval();
        let backoff = self.config.monitoring.failure_backoff();

        loop {
            if self.handle.is_stop_requested().await {
                return Ok(());
            }

            if let CycleOutcome::Failed(_) = self.run_once().await? {
                if !self.handle.sleep(backoff).await {
                    return Ok(());
                }
            }

            if !self.handle.sleep(interval).await {
                return Ok(());
            }
        }
    }

    /// 执行一个周期并应用失败计数和重载策略
    ///
    /// 只有重载失败会返回错误，周期本身的失败包含在 `CycleOutcome::Failed` 中。
    pub async fn run_once(&mut self) -> Result<CycleOutcome, SchedulerError> {
        let started = Instant::now();
        let result = match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CycleError::Panicked(panic_message(panic.as_ref()))),
        };
        self.metrics
            .record_cycle(result.is_ok(), started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(report) => {
                if self.consecutive_failures > 0 {
                    info!(
                        previous_failures = self.consecutive_failures,
                        "Monitoring cycle recovered"
                    );
                }
                self.consecutive_failures = 0;
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                error!(
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "Monitoring cycle failed"
                );

                let max = self
                    .config
                    .monitoring
                    .max_consecutive_cycle_failures_before_reload;
                if self.consecutive_failures >= max {
                    warn!(failures = self.consecutive_failures, "Reloading all clients");
                    if let Err(reload) = self.reload_all_clients().await {
                        self.metrics
                            .set_consecutive_failures(self.consecutive_failures);
                        return Err(SchedulerError::Fatal(format!(
                            "client reload failed after {} consecutive cycle failures: {}",
                            self.consecutive_failures, reload
                        )));
                    }
                    self.consecutive_failures = 0;
                }
                CycleOutcome::Failed(e)
            }
        };

        self.metrics
            .set_consecutive_failures(self.consecutive_failures);
        Ok(outcome)
    }

    /// 单个周期：采集 → 发布指标 → 生成事件 → 分类/冷却/分发
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("labwatch.cycle", cycle_id = %cycle_id);
        self.execute_cycle(cycle_id).instrument(span).await
    }

    async fn execute_cycle(&mut self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        let collected = self.collector.collect().await;
        for outcome in &collected.outcomes {
            self.metrics
                .record_source_fetch(&outcome.source_id, outcome.success());
        }
        if collected.all_failed() {
            return Err(CycleError::AllSourcesFailed(collected.outcomes.len()));
        }

        let snapshots: Vec<MetricSnapshot> = collected.metrics().cloned().collect();
        let metrics_published = self.fanout.publish_metrics(&snapshots).await.map(|r| {
            self.metrics.record_delivery(DASHBOARD_SINK, r.success);
            r.success
        });

        let now = Utc::now();
        let mut events: Vec<AlertEvent> = snapshots
            .iter()
            .filter_map(|s| metric_event(s, self.classifier.thresholds()))
            .collect();
        events.extend(self.escalations.escalate(
            collected.incidents(),
            self.config.monitoring.incident_escalation(),
            now,
        ));
        if collected.outcomes.iter().all(|o| o.incidents_error.is_none()) {
            let forgotten = self.escalations.retain_reported(collected.incidents());
            if forgotten > 0 {
                debug!(forgotten, "Escalated incidents no longer reported");
            }
        }

        let mut alerts = Vec::new();
        for event in &events {
            alerts.extend(self.process_alert(event).await);
        }

        let pruned_cooldowns = self.cooldown.prune_expired(now);

        let attempted = alerts.iter().filter(|p| p.report.attempted()).count();
        let delivered = alerts.iter().filter(|p| p.report.succeeded()).count();
        if attempted > 0 && delivered == 0 {
            return Err(CycleError::DeliveryFailed(attempted));
        }

        let report = CycleReport {
            cycle_id,
            sources: collected.outcomes.len(),
            failed_sources: collected
                .failed_sources()
                .into_iter()
                .map(String::from)
                .collect(),
            snapshots: snapshots.len(),
            incidents: collected.incidents().count(),
            events: events.len(),
            alerts,
            metrics_published,
            pruned_cooldowns,
        };

        info!(
            sources = report.sources,
            failed_sources = report.failed_sources.len(),
            snapshots = report.snapshots,
            events = report.events,
            alerts = report.alerts.len(),
            suppressed = report.suppressed(),
            "Monitoring cycle completed"
        );
        Ok(report)
    }

    /// 分类一个事件并把每条结果交给分发器
    ///
    /// 冷却时钟使用事件自身的时间戳。没有匹配任何目的地的事件被丢弃。
    pub async fn process_alert(&mut self, event: &AlertEvent) -> Vec<ProcessedAlert> {
        let alerts = self.classifier.classify(event);
        let mut processed = Vec::with_capacity(alerts.len());
        for alert in alerts {
            self.metrics.record_alert(&alert);
            let report = self
                .fanout
                .deliver(&alert, self.cooldown.as_mut(), event.timestamp)
                .await;

            for result in report.results.values() {
                self.metrics.record_delivery(&result.sink_name, result.success);
            }
            if report.chat_suppressed {
                self.metrics.record_suppressed();
            }

            processed.push(ProcessedAlert { alert, report });
        }
        processed
    }

    /// 通过 `ClientProvider` 重建所有上下游客户端
    ///
    /// 失败时保留旧客户端。
    pub async fn reload_all_clients(&mut self) -> Result<(), SchedulerError> {
        let clients = self
            .provider
            .build_clients()
            .await
            .map_err(SchedulerError::ClientBuild)?;

        self.collector = clients.collector;
        self.fanout = clients.fanout;
        self.metrics.record_reload();
        info!(
            sources = self.collector.source_count(),
            "All clients reloaded"
        );
        Ok(())
    }
}
