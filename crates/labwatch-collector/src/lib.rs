pub mod collector;
pub mod http;
pub mod source;

pub use collector::{CollectorResult, DataCollector, SourceOutcome};
pub use http::HttpSource;
pub use source::{MetricSource, SourceError};
