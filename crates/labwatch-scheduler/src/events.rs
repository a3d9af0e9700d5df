//! 从采集结果生成告警事件

use chrono::{DateTime, Duration, Utc};
use labwatch_alert::ThresholdEvaluator;
use labwatch_core::{AlertEvent, Incident, MetricSnapshot};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// 指标快照越过阈值时生成事件，否则返回 `None`
pub fn metric_event(snapshot: &MetricSnapshot, evaluator: &ThresholdEvaluator) -> Option<AlertEvent> {
    let readings = snapshot.readings();
    let breaches = evaluator.evaluate(&readings);
    if breaches.is_empty() {
        return None;
    }

    let mut details: Vec<String> = breaches.iter().map(ToString::to_string).collect();
    if !snapshot.tat_target_met {
        details.push("TAT target missed".to_string());
    }

    debug!(
        staff = %snapshot.staff_member,
        breaches = breaches.len(),
        "Snapshot breached thresholds"
    );

    Some(
        AlertEvent::new(format!(
            "Staff performance alert for {}: {}",
            snapshot.staff_member,
            details.join(", ")
        ))
        .with_metrics(readings)
        .with_subject(&snapshot.staff_member)
        .at(snapshot.timestamp),
    )
}

/// 已升级事件的记录
///
/// 上游每个周期都会重新报告未处理的事件，这里保证同一事件只升级一次。
/// 事件从一次完整的事件列表中消失（已确认或已关闭）后，记录被清除。
#[derive(Debug, Default)]
pub struct EscalationLedger {
    escalated: HashMap<String, DateTime<Utc>>,
}

impl EscalationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.escalated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escalated.is_empty()
    }

    pub fn contains(&self, incident_id: &str) -> bool {
        self.escalated.contains_key(incident_id)
    }

    /// 升级超时未确认的严重事件，为每个新升级的事件生成告警
    pub fn escalate<'a>(
        &mut self,
        incidents: impl IntoIterator<Item = &'a Incident>,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for incident in incidents {
            if self.contains(&incident.incident_id) || !incident.should_escalate(now, threshold) {
                continue;
            }

            let mut incident = incident.clone();
            if let Err(e) = incident.escalate() {
                warn!(incident_id = %incident.incident_id, error = %e, "Failed to escalate incident");
                continue;
            }
            self.escalated.insert(incident.incident_id.clone(), now);

            let minutes = (now - incident.timestamp).num_minutes();
            events.push(
                AlertEvent::new(format!(
                    "Critical incident {} ({}) for {} unacknowledged for {} minutes - escalated",
                    incident.incident_id, incident.kind, incident.staff_member, minutes
                ))
                .with_subject(&incident.staff_member)
                .at(now)
                .with_incident(incident),
            );
        }

        events
    }

    /// 清除不在本次事件列表中的记录，返回清除数量
    ///
    /// 只应在所有数据源的事件端点都成功时调用。
    pub fn retain_reported<'a>(&mut self, incidents: impl IntoIterator<Item = &'a Incident>) -> usize {
        let reported: HashSet<&str> = incidents
            .into_iter()
            .map(|incident| incident.incident_id.as_str())
            .collect();
        let before = self.escalated.len();
        self.escalated.retain(|id, _| reported.contains(id.as_str()));
        before - self.escalated.len()
    }
}
