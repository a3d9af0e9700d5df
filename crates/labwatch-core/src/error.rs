use thiserror::Error;

use crate::incident::IncidentStatus;

/// 核心领域错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 非法的事件状态迁移
    #[error("Invalid incident transition for {incident_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        incident_id: String,
        from: IncidentStatus,
        to: IncidentStatus,
    },
}

/// 核心结果类型
pub type Result<T> = std::result::Result<T, CoreError>;
