pub mod classifier;
pub mod cooldown;
pub mod keywords;
pub mod threshold;

pub use classifier::AlertClassifier;
pub use cooldown::{CooldownCache, CooldownStore};
pub use keywords::contains_keyword;
pub use threshold::{Direction, MonitoredMetric, ThresholdBreach, ThresholdEvaluator};
