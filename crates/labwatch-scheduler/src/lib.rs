pub mod error;
pub mod events;
pub mod metrics;
pub mod provider;
pub mod scheduler;

pub use error::{CycleError, SchedulerError};
pub use events::EscalationLedger;
pub use metrics::SchedulerMetrics;
pub use provider::{ClientProvider, ClientSet, HttpClientProvider};
pub use scheduler::{
    CycleOutcome, CycleReport, MonitoringScheduler, ProcessedAlert, SchedulerHandle,
    SchedulerState,
};
