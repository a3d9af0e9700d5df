use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// 事件状态
///
/// 允许的迁移：
/// `Open -> InProgress`, `Open -> Escalated`, `InProgress -> Resolved`,
/// `InProgress -> Escalated`, `Escalated -> Resolved`。`Resolved` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Escalated,
    Resolved,
}

impl IncidentStatus {
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, next),
            (Open, InProgress)
                | (Open, Escalated)
                | (InProgress, Resolved)
                | (InProgress, Escalated)
                | (Escalated, Resolved)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }
}

/// 事件记录，只追加、只迁移，不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    pub staff_member: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Incident {
    /// 指派处理人：`Open -> InProgress`
    pub fn assign(&mut self) -> Result<()> {
        self.transition(IncidentStatus::InProgress)?;
        self.acknowledged = true;
        Ok(())
    }

    /// 关闭事件
    pub fn resolve(&mut self) -> Result<()> {
        self.transition(IncidentStatus::Resolved)
    }

    /// 升级事件
    pub fn escalate(&mut self) -> Result<()> {
        self.transition(IncidentStatus::Escalated)
    }

    fn transition(&mut self, next: IncidentStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                incident_id: self.incident_id.clone(),
                from: self.status,
                to: next,
            });
        }

        info!(
            incident_id = %self.incident_id,
            from = ?self.status,
            to = ?next,
            "Incident status changed"
        );
        self.status = next;
        Ok(())
    }

    /// 严重且未确认的事件超过阈值时长后需要升级
    pub fn should_escalate(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.severity == IncidentSeverity::Critical
            && !self.acknowledged
            && matches!(self.status, IncidentStatus::Open | IncidentStatus::InProgress)
            && now - self.timestamp >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(severity: IncidentSeverity) -> Incident {
        Incident {
            incident_id: "INC-001".to_string(),
            timestamp: Utc::now(),
            staff_member: "A. Chen".to_string(),
            kind: "specimen_mislabel".to_string(),
            severity,
            status: IncidentStatus::Open,
            acknowledged: false,
        }
    }

    #[test]
    fn test_assign_then_resolve() {
        let mut inc = incident(IncidentSeverity::Medium);
        inc.assign().unwrap();
        assert_eq!(inc.status, IncidentStatus::InProgress);
        assert!(inc.acknowledged);

        inc.resolve().unwrap();
        assert_eq!(inc.status, IncidentStatus::Resolved);
    }

    #[test]
    fn test_open_cannot_resolve_directly() {
        let mut inc = incident(IncidentSeverity::Low);
        let err = inc.resolve().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: IncidentStatus::Open,
                to: IncidentStatus::Resolved,
                ..
            }
        ));
        assert_eq!(inc.status, IncidentStatus::Open);
    }

    #[test]
    fn test_resolved_is_terminal() {
        let mut inc = incident(IncidentSeverity::High);
        inc.escalate().unwrap();
        inc.resolve().unwrap();

        assert!(inc.status.is_terminal());
        assert!(inc.escalate().is_err());
        assert!(inc.assign().is_err());
        assert!(inc.resolve().is_err());
    }

    #[test]
    fn test_transition_table() {
        use IncidentStatus::*;
        let all = [Open, InProgress, Escalated, Resolved];
        let allowed = [
            (Open, InProgress),
            (Open, Escalated),
            (InProgress, Resolved),
            (InProgress, Escalated),
            (Escalated, Resolved),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_should_escalate() {
        let now = Utc::now();
        let threshold = Duration::minutes(30);

        let mut inc = incident(IncidentSeverity::Critical);
        inc.timestamp = now - Duration::minutes(45);
        assert!(inc.should_escalate(now, threshold));

        inc.timestamp = now - Duration::minutes(10);
        assert!(!inc.should_escalate(now, threshold));

        let mut acked = incident(IncidentSeverity::Critical);
        acked.timestamp = now - Duration::minutes(45);
        acked.assign().unwrap();
        assert!(!acked.should_escalate(now, threshold));

        let mut minor = incident(IncidentSeverity::High);
        minor.timestamp = now - Duration::hours(5);
        assert!(!minor.should_escalate(now, threshold));
    }

    #[test]
    fn test_incident_type_field_name() {
        let inc = incident(IncidentSeverity::Low);
        let json = serde_json::to_value(&inc).unwrap();
        assert_eq!(json["type"], "specimen_mislabel");
        assert_eq!(json["status"], "open");
    }
}
