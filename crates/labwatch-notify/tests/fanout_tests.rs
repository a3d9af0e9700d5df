use async_trait::async_trait;
use chrono::{Duration, Utc};
use labwatch_alert::CooldownCache;
use labwatch_core::{
    AlertEvent, ClassifiedAlert, Department, Destination, Incident, IncidentSeverity,
    IncidentStatus, MetricReadings, MetricSnapshot, Priority,
};
use labwatch_notify::{
    AuditSink, ChatSink, DashboardSink, SinkError, SinkFanout, SinkSet, AUDIT_SINK, CHAT_SINK,
    DASHBOARD_SINK,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

struct MockSink {
    behavior: Behavior,
    calls: AtomicUsize,
    rows: Mutex<Vec<Value>>,
    records: Mutex<Vec<Map<String, Value>>>,
}

impl MockSink {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            rows: Mutex::new(Vec::new()),
            records: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(SinkError::Rejected(503)),
            Behavior::Panic => panic!("sink exploded"),
        }
    }
}

#[async_trait]
impl AuditSink for MockSink {
    async fn create_record(
        &self,
        _category: &str,
        properties: &Map<String, Value>,
    ) -> Result<String, SinkError> {
        self.outcome()?;
        self.records.lock().unwrap().push(properties.clone());
        Ok("rec-1".to_string())
    }
}

#[async_trait]
impl DashboardSink for MockSink {
    async fn push_rows(&self, _dataset_key: &str, rows: &[Value]) -> Result<bool, SinkError> {
        self.outcome()?;
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(true)
    }
}

#[async_trait]
impl ChatSink for MockSink {
    async fn send_alert(
        &self,
        _title: &str,
        _body: &str,
        _severity: &str,
        _metadata: &BTreeMap<String, String>,
    ) -> Result<bool, SinkError> {
        self.outcome().map(|_| true)
    }
}

fn fanout(audit: &Arc<MockSink>, dashboard: &Arc<MockSink>, chat: &Arc<MockSink>) -> SinkFanout {
    SinkFanout::new(
        SinkSet {
            audit: Some(audit.clone()),
            dashboard: Some(dashboard.clone()),
            chat: Some(chat.clone()),
        },
        "Lab Alerts",
        "lab_metrics",
    )
}

fn alert(priority: Priority, metrics: Option<MetricReadings>) -> ClassifiedAlert {
    let mut event = AlertEvent::new("Performance drop for J. Rivera").with_subject("J. Rivera");
    event.metrics = metrics;
    ClassifiedAlert {
        destination: Destination::StaffPerformance,
        priority,
        matched_keyword: "performance".to_string(),
        department: Department::Unknown,
        source_event: event,
    }
}

fn readings() -> MetricReadings {
    MetricReadings {
        performance_score: Some(60.0),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_all_sinks_receive_high_alert_with_metrics() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::High, Some(readings())), &mut cooldown, Utc::now())
        .await;

    assert!(report.succeeded());
    assert_eq!(report.results.len(), 3);
    assert_eq!((audit.calls(), dashboard.calls(), chat.calls()), (1, 1, 1));

    let rows = dashboard.rows.lock().unwrap();
    assert_eq!(rows[0]["priority"], "high");
    assert_eq!(rows[0]["performance_score"], 60.0);
}

#[tokio::test]
async fn test_dashboard_failure_does_not_block_other_sinks() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Fail),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::Medium, Some(readings())), &mut cooldown, Utc::now())
        .await;

    assert_eq!((audit.calls(), dashboard.calls(), chat.calls()), (1, 1, 1));
    assert!(report.get(AUDIT_SINK).unwrap().success);
    assert!(report.get(CHAT_SINK).unwrap().success);
    let failed = report.get(DASHBOARD_SINK).unwrap();
    assert!(!failed.success);
    assert!(failed.error.as_deref().unwrap().contains("503"));
    assert!(report.succeeded());
}

#[tokio::test]
async fn test_panicking_sink_is_contained() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Panic),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::High, Some(readings())), &mut cooldown, Utc::now())
        .await;

    let audit_result = report.get(AUDIT_SINK).unwrap();
    assert!(!audit_result.success);
    assert!(audit_result.error.as_deref().unwrap().contains("sink exploded"));
    assert_eq!(chat.calls(), 1);
    assert_eq!(dashboard.calls(), 1);
}

#[tokio::test]
async fn test_low_priority_skips_chat_and_dashboard_without_metrics() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::Low, None), &mut cooldown, Utc::now())
        .await;

    assert_eq!((audit.calls(), dashboard.calls(), chat.calls()), (1, 0, 0));
    assert!(!report.chat_suppressed);
    // 低优先级不占用冷却窗口
    assert!(cooldown.is_empty());
}

#[tokio::test]
async fn test_cooldown_gates_chat_but_not_audit() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);
    let t0 = Utc::now();

    let first = fanout.deliver(&alert(Priority::Medium, None), &mut cooldown, t0).await;
    let second = fanout
        .deliver(&alert(Priority::Medium, None), &mut cooldown, t0 + Duration::minutes(5))
        .await;

    assert!(!first.chat_suppressed);
    assert!(second.chat_suppressed);
    assert!(second.get(CHAT_SINK).is_none());
    assert_eq!(chat.calls(), 1);
    assert_eq!(audit.calls(), 2);

    let third = fanout
        .deliver(&alert(Priority::Medium, None), &mut cooldown, t0 + Duration::minutes(16))
        .await;
    assert!(third.get(CHAT_SINK).unwrap().success);
    assert_eq!(chat.calls(), 2);
}

#[tokio::test]
async fn test_all_sinks_failing_is_reported() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Fail),
        MockSink::new(Behavior::Fail),
        MockSink::new(Behavior::Fail),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::High, Some(readings())), &mut cooldown, Utc::now())
        .await;

    assert!(report.attempted());
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_publish_metrics_and_system_notifications() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);

    assert!(fanout.publish_metrics(&[]).await.is_none());

    let snapshot = MetricSnapshot {
        timestamp: Utc::now(),
        source_id: "lis".to_string(),
        staff_member: "A. Chen".to_string(),
        samples_processed: 100,
        error_count: 2,
        break_time_minutes: 20.0,
        qc_completion_percent: 100.0,
        tat_target_met: true,
        performance_score: 88.0,
    };
    let result = fanout.publish_metrics(&[snapshot]).await.unwrap();
    assert!(result.success);
    assert_eq!(dashboard.rows.lock().unwrap()[0]["staff_member"], "A. Chen");

    let result = fanout.notify_system("Started", "monitoring", "info").await.unwrap();
    assert!(result.success);
    assert_eq!(chat.calls(), 1);
}

#[tokio::test]
async fn test_unconfigured_sinks_are_skipped() {
    let fanout = SinkFanout::new(SinkSet::default(), "Lab Alerts", "lab_metrics");
    let mut cooldown = CooldownCache::from_minutes(15);

    let report = fanout
        .deliver(&alert(Priority::High, Some(readings())), &mut cooldown, Utc::now())
        .await;
    assert!(!report.attempted());
    assert!(fanout.notify_system("x", "y", "info").await.is_none());
    assert!(cooldown.is_empty());
}

#[tokio::test]
async fn test_escalation_audit_carries_incident() {
    let (audit, dashboard, chat) = (
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
        MockSink::new(Behavior::Succeed),
    );
    let fanout = fanout(&audit, &dashboard, &chat);
    let mut cooldown = CooldownCache::from_minutes(15);
    let now = Utc::now();

    let incident = Incident {
        incident_id: "INC-42".to_string(),
        timestamp: now - Duration::minutes(45),
        staff_member: "R. Patel".to_string(),
        kind: "specimen_mislabel".to_string(),
        severity: IncidentSeverity::Critical,
        status: IncidentStatus::Escalated,
        acknowledged: false,
    };
    let alert = ClassifiedAlert {
        destination: Destination::Compliance,
        priority: Priority::Compliance,
        matched_keyword: "incident".to_string(),
        department: Department::Unknown,
        source_event: AlertEvent::new("Critical incident INC-42 escalated")
            .with_subject("R. Patel")
            .with_incident(incident),
    };

    let report = fanout.deliver(&alert, &mut cooldown, now).await;
    assert!(report.succeeded());

    let records = audit.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["incident_id"], Value::String("INC-42".to_string()));
    assert_eq!(records[0]["incident_status"], Value::String("escalated".to_string()));
    assert_eq!(records[0]["incident_type"], Value::String("specimen_mislabel".to_string()));
    assert_eq!(records[0]["subject"], Value::String("R. Patel".to_string()));
}
