pub mod error;
pub mod incident;
pub mod model;
pub mod panic;

pub use error::{CoreError, Result};
pub use incident::{Incident, IncidentSeverity, IncidentStatus};
pub use panic::panic_message;
pub use model::{
    AlertEvent, ClassifiedAlert, Department, Destination, MetricReadings, MetricSnapshot,
    Priority, SinkResult,
};
