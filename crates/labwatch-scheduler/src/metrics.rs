use labwatch_core::ClassifiedAlert;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// 调度器运行指标
#[derive(Clone)]
pub struct SchedulerMetrics {
    // 周期指标
    cycles_total: CounterVec,
    cycle_duration: Histogram,
    consecutive_failures: Gauge,
    reloads_total: IntCounter,

    // 告警指标
    alerts_total: CounterVec,
    notifications_suppressed_total: IntCounter,

    // 上下游指标
    sink_deliveries_total: CounterVec,
    source_fetches_total: CounterVec,

    registry: Registry,
}

impl SchedulerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = CounterVec::new(
            Opts::new("labwatch_cycles_total", "Monitoring cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("labwatch_cycle_duration_seconds", "Monitoring cycle duration")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let consecutive_failures = Gauge::with_opts(Opts::new(
            "labwatch_consecutive_cycle_failures",
            "Current run of failed cycles",
        ))?;
        registry.register(Box::new(consecutive_failures.clone()))?;

        let reloads_total = IntCounter::with_opts(Opts::new(
            "labwatch_client_reloads_total",
            "Client rebuilds triggered by repeated cycle failures",
        ))?;
        registry.register(Box::new(reloads_total.clone()))?;

        let alerts_total = CounterVec::new(
            Opts::new("labwatch_alerts_total", "Classified alerts"),
            &["destination", "priority"],
        )?;
        registry.register(Box::new(alerts_total.clone()))?;

        let notifications_suppressed_total = IntCounter::with_opts(Opts::new(
            "labwatch_notifications_suppressed_total",
            "Chat notifications suppressed by cooldown",
        ))?;
        registry.register(Box::new(notifications_suppressed_total.clone()))?;

        let sink_deliveries_total = CounterVec::new(
            Opts::new("labwatch_sink_deliveries_total", "Sink delivery attempts"),
            &["sink", "outcome"],
        )?;
        registry.register(Box::new(sink_deliveries_total.clone()))?;

        let source_fetches_total = CounterVec::new(
            Opts::new("labwatch_source_fetches_total", "Source collection attempts"),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(source_fetches_total.clone()))?;

        Ok(Self {
            cycles_total,
            cycle_duration,
            consecutive_failures,
            reloads_total,
            alerts_total,
            notifications_suppressed_total,
            sink_deliveries_total,
            source_fetches_total,
            registry,
        })
    }

    pub fn record_cycle(&self, success: bool, seconds: f64) {
        self.cycles_total
            .with_label_values(&[outcome(success)])
            .inc();
        self.cycle_duration.observe(seconds);
    }

    pub fn set_consecutive_failures(&self, count: u32) {
        self.consecutive_failures.set(count as f64);
    }

    pub fn record_reload(&self) {
        self.reloads_total.inc();
    }

    pub fn record_alert(&self, alert: &ClassifiedAlert) {
        self.alerts_total
            .with_label_values(&[alert.destination.as_str(), alert.priority.as_str()])
            .inc();
    }

    pub fn record_suppressed(&self) {
        self.notifications_suppressed_total.inc();
    }

    pub fn record_delivery(&self, sink: &str, success: bool) {
        self.sink_deliveries_total
            .with_label_values(&[sink, outcome(success)])
            .inc();
    }

    pub fn record_source_fetch(&self, source: &str, success: bool) {
        self.source_fetches_total
            .with_label_values(&[source, outcome(success)])
            .inc();
    }

    pub fn reloads(&self) -> u64 {
        self.reloads_total.get()
    }

    /// 导出 Prometheus 文本格式
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
