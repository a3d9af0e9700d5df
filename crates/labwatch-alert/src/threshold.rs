use labwatch_config::ThresholdConfig;
use labwatch_core::{MetricReadings, Priority};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 被监控的指标字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredMetric {
    PerformanceScore,
    ErrorRate,
    BreakTimeMinutes,
    QcCompletionPercent,
}

impl MonitoredMetric {
    pub const ALL: [MonitoredMetric; 4] = [
        MonitoredMetric::PerformanceScore,
        MonitoredMetric::ErrorRate,
        MonitoredMetric::BreakTimeMinutes,
        MonitoredMetric::QcCompletionPercent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoredMetric::PerformanceScore => "performance_score",
            MonitoredMetric::ErrorRate => "error_rate",
            MonitoredMetric::BreakTimeMinutes => "break_time_minutes",
            MonitoredMetric::QcCompletionPercent => "qc_completion_percent",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            MonitoredMetric::PerformanceScore | MonitoredMetric::QcCompletionPercent => {
                Direction::LowerIsWorse
            }
            MonitoredMetric::ErrorRate | MonitoredMetric::BreakTimeMinutes => {
                Direction::HigherIsWorse
            }
        }
    }

    fn reading(&self, readings: &MetricReadings) -> Option<f64> {
        match self {
            MonitoredMetric::PerformanceScore => readings.performance_score,
            MonitoredMetric::ErrorRate => readings.error_rate,
            MonitoredMetric::BreakTimeMinutes => readings.break_time_minutes,
            MonitoredMetric::QcCompletionPercent => readings.qc_completion_percent,
        }
    }

    fn threshold(&self, config: &ThresholdConfig) -> f64 {
        match self {
            MonitoredMetric::PerformanceScore => config.performance_score_threshold,
            MonitoredMetric::ErrorRate => config.error_rate_threshold,
            MonitoredMetric::BreakTimeMinutes => config.break_time_threshold_minutes,
            MonitoredMetric::QcCompletionPercent => config.qc_completion_threshold,
        }
    }
}

impl fmt::Display for MonitoredMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 指标的恶化方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsWorse,
    /// 百分比指标，按距离 100 的差额比较
    LowerIsWorse,
}

impl Direction {
    /// 转换为“越大越差”的度量
    fn measure(&self, value: f64) -> f64 {
        match self {
            Direction::HigherIsWorse => value,
            Direction::LowerIsWorse => 100.0 - value,
        }
    }
}

/// 单个指标的越限记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub metric: MonitoredMetric,
    pub value: f64,
    pub threshold: f64,
    pub priority: Priority,
}

impl fmt::Display for ThresholdBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={:.1} (threshold {:.1})",
            self.metric, self.value, self.threshold
        )
    }
}

/// 阈值判定器
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    config: ThresholdConfig,
}

impl ThresholdEvaluator {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// 越过阈值为 Medium，越过 `escalation_factor` 倍阈值为 High
    pub fn evaluate(&self, readings: &MetricReadings) -> Vec<ThresholdBreach> {
        MonitoredMetric::ALL
            .iter()
            .filter_map(|metric| {
                let value = metric.reading(readings)?;
                let threshold = metric.threshold(&self.config);
                let direction = metric.direction();

                let measure = direction.measure(value);
                let limit = direction.measure(threshold);
                if measure <= limit {
                    return None;
                }

                let priority = if measure >= limit * self.config.escalation_factor {
                    Priority::High
                } else {
                    Priority::Medium
                };

                Some(ThresholdBreach {
                    metric: *metric,
                    value,
                    threshold,
                    priority,
                })
            })
            .collect()
    }

    /// 所有越限项中最严重的优先级
    pub fn worst(&self, readings: &MetricReadings) -> Option<Priority> {
        self.evaluate(readings).into_iter().map(|b| b.priority).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(ThresholdConfig::default())
    }

    #[test]
    fn test_low_performance_score_is_high() {
        let readings = MetricReadings {
            performance_score: Some(55.0),
            ..Default::default()
        };
        let breaches = evaluator().evaluate(&readings);
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, MonitoredMetric::PerformanceScore);
        assert_eq!(breaches[0].priority, Priority::High);
    }

    #[test]
    fn test_slightly_low_performance_score_is_medium() {
        let readings = MetricReadings {
            performance_score: Some(65.0),
            ..Default::default()
        };
        assert_eq!(evaluator().worst(&readings), Some(Priority::Medium));
    }

    #[test]
    fn test_error_rate_bands() {
        let ev = evaluator();
        let at = |rate| MetricReadings {
            error_rate: Some(rate),
            ..Default::default()
        };
        assert_eq!(ev.worst(&at(5.0)), None);
        assert_eq!(ev.worst(&at(6.0)), Some(Priority::Medium));
        assert_eq!(ev.worst(&at(7.5)), Some(Priority::High));
    }

    #[test]
    fn test_qc_completion_bands() {
        let ev = evaluator();
        let at = |pct| MetricReadings {
            qc_completion_percent: Some(pct),
            ..Default::default()
        };
        assert_eq!(ev.worst(&at(99.0)), None);
        assert_eq!(ev.worst(&at(94.0)), Some(Priority::Medium));
        assert_eq!(ev.worst(&at(90.0)), Some(Priority::High));
    }

    #[test]
    fn test_worst_of_several_breaches() {
        let readings = MetricReadings {
            performance_score: Some(68.0),
            break_time_minutes: Some(120.0),
            ..Default::default()
        };
        let breaches = evaluator().evaluate(&readings);
        assert_eq!(breaches.len(), 2);
        assert_eq!(evaluator().worst(&readings), Some(Priority::High));
    }

    #[test]
    fn test_empty_readings() {
        assert!(evaluator().evaluate(&MetricReadings::default()).is_empty());
    }
}
