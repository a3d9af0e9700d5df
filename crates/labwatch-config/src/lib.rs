pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::{render, validate, ConfigLoader, ENV_PREFIX, MAX_WINDOW_MINUTES};
pub use settings::{
    ClassifierConfig, DepartmentRule, DestinationRule, LabwatchConfig, LoggingConfig,
    MonitoringConfig, SinkConfig, SourceConfig, ThresholdConfig,
};
