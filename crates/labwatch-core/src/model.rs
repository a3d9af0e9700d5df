use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::incident::Incident;

/// 告警优先级
///
/// 排序仅用于阈值规则内取最严重的一项，`Compliance` 是独立的合规类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Compliance,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Compliance => "compliance",
        }
    }

    /// 是否需要推送到聊天渠道
    pub fn notifies_chat(&self) -> bool {
        match self {
            Priority::Low => false,
            Priority::Medium | Priority::High | Priority::Compliance => true,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警路由目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    StaffPerformance,
    CriticalValues,
    QualityControl,
    Equipment,
    Inventory,
    Scheduling,
    Compliance,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::StaffPerformance => "staff_performance",
            Destination::CriticalValues => "critical_values",
            Destination::QualityControl => "quality_control",
            Destination::Equipment => "equipment",
            Destination::Inventory => "inventory",
            Destination::Scheduling => "scheduling",
            Destination::Compliance => "compliance",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 检验科室
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Chemistry,
    Hematology,
    Microbiology,
    BloodBank,
    Immunology,
    Urinalysis,
    Phlebotomy,
    Unknown,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Chemistry => "Chemistry",
            Department::Hematology => "Hematology",
            Department::Microbiology => "Microbiology",
            Department::BloodBank => "Blood Bank",
            Department::Immunology => "Immunology",
            Department::Urinalysis => "Urinalysis",
            Department::Phlebotomy => "Phlebotomy",
            Department::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个数据源在一个周期内产出的人员指标快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    pub source_id: String,
    pub staff_member: String,
    pub samples_processed: u32,
    pub error_count: u32,
    pub break_time_minutes: f64,
    pub qc_completion_percent: f64,
    pub tat_target_met: bool,
    pub performance_score: f64,
}

impl MetricSnapshot {
    /// 错误率（百分比），没有处理样本时为 0
    pub fn error_rate(&self) -> f64 {
        if self.samples_processed == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.samples_processed as f64 * 100.0
    }

    /// 分类器使用的读数
    pub fn readings(&self) -> MetricReadings {
        MetricReadings {
            performance_score: Some(self.performance_score),
            error_rate: Some(self.error_rate()),
            break_time_minutes: Some(self.break_time_minutes),
            qc_completion_percent: Some(self.qc_completion_percent),
        }
    }

    /// 仪表盘行
    pub fn to_row(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "source_id": self.source_id,
            "staff_member": self.staff_member,
            "samples_processed": self.samples_processed,
            "error_count": self.error_count,
            "error_rate": self.error_rate(),
            "break_time_minutes": self.break_time_minutes,
            "qc_completion_percent": self.qc_completion_percent,
            "tat_target_met": self.tat_target_met,
            "performance_score": self.performance_score,
        })
    }
}

/// 随告警携带的结构化指标，缺失的字段不参与阈值判断
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReadings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_time_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_completion_percent: Option<f64>,
}

impl MetricReadings {
    pub fn is_empty(&self) -> bool {
        self.performance_score.is_none()
            && self.error_rate.is_none()
            && self.break_time_minutes.is_none()
            && self.qc_completion_percent.is_none()
    }
}

/// 分类器输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub raw_message: String,
    pub metrics: Option<MetricReadings>,
    /// 告警主体（通常是人员姓名），用于冷却键
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// 由事件升级产生时携带升级后的事件记录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<Incident>,
}

impl AlertEvent {
    pub fn new(raw_message: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
            metrics: None,
            subject: None,
            timestamp: Utc::now(),
            incident: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricReadings) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_incident(mut self, incident: Incident) -> Self {
        self.incident = Some(incident);
        self
    }
}

/// 分类结果，生成后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedAlert {
    pub destination: Destination,
    pub priority: Priority,
    pub matched_keyword: String,
    pub department: Department,
    pub source_event: AlertEvent,
}

impl ClassifiedAlert {
    /// 冷却键：类别 + 主体
    ///
    /// 事件升级告警按事件编号去重，同一人员的不同事件互不抑制。
    pub fn cooldown_key(&self) -> String {
        let event = &self.source_event;
        let subject = event
            .incident
            .as_ref()
            .map(|incident| incident.incident_id.as_str())
            .or(event.subject.as_deref())
            .unwrap_or(&self.matched_keyword);
        format!("{}:{}", self.destination, subject.to_lowercase())
    }

    pub fn title(&self) -> String {
        format!(
            "[{}] {} alert - {}",
            self.priority.as_str().to_uppercase(),
            self.destination,
            self.department
        )
    }
}

/// 单个下游渠道的投递结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkResult {
    pub sink_name: String,
    pub success: bool,
    pub error: Option<String>,
}

impl SinkResult {
    pub fn success(sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            success: true,
            error: None,
        }
    }

    pub fn failure(sink_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricSnapshot {
        MetricSnapshot {
            timestamp: Utc::now(),
            source_id: "lis".to_string(),
            staff_member: "J. Rivera".to_string(),
            samples_processed: 200,
            error_count: 6,
            break_time_minutes: 30.0,
            qc_completion_percent: 98.0,
            tat_target_met: true,
            performance_score: 82.0,
        }
    }

    #[test]
    fn test_error_rate() {
        assert!((snapshot().error_rate() - 3.0).abs() < f64::EPSILON);

        let mut idle = snapshot();
        idle.samples_processed = 0;
        assert_eq!(idle.error_rate(), 0.0);
    }

    #[test]
    fn test_cooldown_key_prefers_subject() {
        let alert = ClassifiedAlert {
            destination: Destination::StaffPerformance,
            priority: Priority::Medium,
            matched_keyword: "performance".to_string(),
            department: Department::Unknown,
            source_event: AlertEvent::new("performance drop").with_subject("J. Rivera"),
        };
        assert_eq!(alert.cooldown_key(), "staff_performance:j. rivera");

        let anonymous = ClassifiedAlert {
            source_event: AlertEvent::new("performance drop"),
            ..alert
        };
        assert_eq!(anonymous.cooldown_key(), "staff_performance:performance");
    }

    #[test]
    fn test_cooldown_key_uses_incident_id() {
        let incident = Incident {
            incident_id: "INC-42".to_string(),
            timestamp: Utc::now(),
            staff_member: "R. Patel".to_string(),
            kind: "specimen_mislabel".to_string(),
            severity: crate::IncidentSeverity::Critical,
            status: crate::IncidentStatus::Escalated,
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
        assert_eq!(alert.cooldown_key(), "compliance:inc-42");
    }

    #[test]
    fn test_priority_chat_eligibility() {
        assert!(!Priority::Low.notifies_chat());
        assert!(Priority::Medium.notifies_chat());
        assert!(Priority::High.notifies_chat());
        assert!(Priority::Compliance.notifies_chat());
    }

    #[test]
    fn test_destination_serde_names() {
        let json = serde_json::to_string(&Destination::CriticalValues).unwrap();
        assert_eq!(json, "\"critical_values\"");
        let parsed: Department = serde_json::from_str("\"blood_bank\"").unwrap();
        assert_eq!(parsed, Department::BloodBank);
    }
}
