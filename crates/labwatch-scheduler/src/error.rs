use thiserror::Error;

use crate::scheduler::SchedulerState;

/// 单个周期的失败，由调度器捕获并计入重载阈值，不向上传播
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("All {0} configured sources failed")]
    AllSourcesFailed(usize),

    #[error("All {0} alert deliveries failed on every sink")]
    DeliveryFailed(usize),

    #[error("Cycle panicked: {0}")]
    Panicked(String),
}

/// 调度器自身的错误
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 调度器状态不允许该操作
    #[error("Scheduler cannot start from state {0:?}")]
    InvalidState(SchedulerState),

    /// 构建客户端失败
    #[error("Failed to build clients: {0}")]
    ClientBuild(#[source] anyhow::Error),

    /// 循环外层的不可恢复错误
    #[error("Fatal monitoring loop error: {0}")]
    Fatal(String),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}
