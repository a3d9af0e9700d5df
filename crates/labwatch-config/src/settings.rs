use labwatch_core::{Department, Destination, Priority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::loader::MAX_WINDOW_MINUTES;

/// 全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LabwatchConfig {
    pub monitoring: MonitoringConfig,
    pub thresholds: ThresholdConfig,
    pub classifier: ClassifierConfig,
    pub sources: Vec<SourceConfig>,
    pub sinks: SinkConfig,
    pub logging: LoggingConfig,
}

/// 监控循环配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub monitoring_interval_seconds: u64,
    pub alert_cooldown_minutes: u64,
    pub max_consecutive_cycle_failures_before_reload: u32,
    /// 周期失败后额外等待的秒数
    pub failure_backoff_seconds: u64,
    /// 严重事件未确认多久后升级
    pub incident_escalation_minutes: u64,
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_seconds)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_seconds)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.alert_cooldown_minutes.min(MAX_WINDOW_MINUTES) as i64)
    }

    pub fn incident_escalation(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.incident_escalation_minutes.min(MAX_WINDOW_MINUTES) as i64)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_seconds: 300,
            alert_cooldown_minutes: 15,
            max_consecutive_cycle_failures_before_reload: 3,
            failure_backoff_seconds: 5,
            incident_escalation_minutes: 30,
        }
    }
}

/// 指标阈值
///
/// `performance_score` 与 `qc_completion_percent` 越低越差，其余越高越差。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub performance_score_threshold: f64,
    pub error_rate_threshold: f64,
    pub break_time_threshold_minutes: f64,
    pub qc_completion_threshold: f64,
    /// 超出阈值该倍数时升为 High
    pub escalation_factor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            performance_score_threshold: 70.0,
            error_rate_threshold: 5.0,
            break_time_threshold_minutes: 60.0,
            qc_completion_threshold: 95.0,
            escalation_factor: 1.5,
        }
    }
}

/// 目标路由规则
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DestinationRule {
    pub destination: Destination,
    pub keywords: Vec<String>,
    pub default_priority: Priority,
}

/// 科室匹配规则，按表顺序首个命中生效
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DepartmentRule {
    pub department: Department,
    pub keywords: Vec<String>,
}

/// 分类器关键字表
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub urgent_keywords: Vec<String>,
    pub high_priority_destinations: Vec<Destination>,
    pub destinations: Vec<DestinationRule>,
    pub departments: Vec<DepartmentRule>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let destination = |destination, keywords: &[&str], default_priority| DestinationRule {
            destination,
            keywords: words(keywords),
            default_priority,
        };
        let department = |department, keywords: &[&str]| DepartmentRule {
            department,
            keywords: words(keywords),
        };

        Self {
            urgent_keywords: words(&[
                "critical",
                "emergency",
                "stat",
                "urgent",
                "patient safety",
                "wrong blood",
                "contamination",
            ]),
            high_priority_destinations: vec![Destination::CriticalValues],
            destinations: vec![
                destination(
                    Destination::CriticalValues,
                    &["critical value", "panic value", "critical result", "callback"],
                    Priority::High,
                ),
                destination(
                    Destination::StaffPerformance,
                    &["performance", "error rate", "errors", "productivity", "break time", "tat"],
                    Priority::Low,
                ),
                destination(
                    Destination::QualityControl,
                    &["qc", "quality control", "calibration", "westgard", "proficiency"],
                    Priority::Medium,
                ),
                destination(
                    Destination::Equipment,
                    &["analyzer", "instrument", "down", "malfunction", "centrifuge", "maintenance"],
                    Priority::Medium,
                ),
                destination(
                    Destination::Inventory,
                    &["inventory", "reagent", "reagents", "supplies", "stock", "backorder"],
                    Priority::Low,
                ),
                destination(
                    Destination::Scheduling,
                    &["schedule", "coverage", "shift", "call out", "sick", "overtime", "staffing"],
                    Priority::Low,
                ),
                destination(
                    Destination::Compliance,
                    &["compliance", "incident", "cap inspection", "clia", "competency", "hipaa"],
                    Priority::Compliance,
                ),
            ],
            departments: vec![
                department(
                    Department::BloodBank,
                    &["blood bank", "transfusion", "crossmatch", "type and screen", "wrong blood"],
                ),
                department(
                    Department::Chemistry,
                    &["chemistry", "chem", "cmp", "bmp", "troponin", "lipid panel"],
                ),
                department(
                    Department::Hematology,
                    &["hematology", "heme", "cbc", "coagulation", "coag"],
                ),
                department(
                    Department::Microbiology,
                    &["microbiology", "micro", "culture", "gram stain"],
                ),
                department(Department::Immunology, &["immunology", "serology", "elisa"]),
                department(Department::Urinalysis, &["urinalysis", "urine"]),
                department(Department::Phlebotomy, &["phlebotomy", "draw", "collection"]),
            ],
        }
    }
}

/// 上游数据源
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
}

/// 下游渠道，未配置 URL 的渠道不启用
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    pub audit_url: Option<String>,
    pub audit_token: Option<String>,
    pub audit_category: String,
    pub dashboard_url: Option<String>,
    pub dashboard_dataset: String,
    pub chat_webhook_url: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            audit_url: None,
            audit_token: None,
            audit_category: "Lab Alerts".to_string(),
            dashboard_url: None,
            dashboard_dataset: "lab_metrics".to_string(),
            chat_webhook_url: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
