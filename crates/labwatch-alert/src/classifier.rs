use labwatch_config::{ClassifierConfig, ThresholdConfig};
use labwatch_core::{AlertEvent, ClassifiedAlert, Department, Destination, Priority};
use tracing::debug;

use crate::keywords::{contains_keyword, normalize};
use crate::threshold::ThresholdEvaluator;

struct DestinationMatcher {
    destination: Destination,
    keywords: Vec<String>,
    default_priority: Priority,
}

struct DepartmentMatcher {
    department: Department,
    keywords: Vec<String>,
}

/// 告警分类器
///
/// 纯函数：相同的事件与关键字表总是得到相同的结果。
pub struct AlertClassifier {
    urgent_keywords: Vec<String>,
    high_priority_destinations: Vec<Destination>,
    destinations: Vec<DestinationMatcher>,
    departments: Vec<DepartmentMatcher>,
    thresholds: ThresholdEvaluator,
}

impl AlertClassifier {
    pub fn new(config: &ClassifierConfig, thresholds: &ThresholdConfig) -> Self {
        Self {
            urgent_keywords: normalize(&config.urgent_keywords),
            high_priority_destinations: config.high_priority_destinations.clone(),
            destinations: config
                .destinations
                .iter()
                .map(|rule| DestinationMatcher {
                    destination: rule.destination,
                    keywords: normalize(&rule.keywords),
                    default_priority: rule.default_priority,
                })
                .collect(),
            departments: config
                .departments
                .iter()
                .map(|rule| DepartmentMatcher {
                    department: rule.department,
                    keywords: normalize(&rule.keywords),
                })
                .collect(),
            thresholds: ThresholdEvaluator::new(thresholds.clone()),
        }
    }

    pub fn thresholds(&self) -> &ThresholdEvaluator {
        &self.thresholds
    }

    /// 对一条告警事件分类，每个命中的目标产生一条结果
    ///
    /// 未命中任何目标的事件返回空列表。
    pub fn classify(&self, event: &AlertEvent) -> Vec<ClassifiedAlert> {
        let text = event.raw_message.to_lowercase();
        let department = self.match_department(&text);
        let urgent = self
            .urgent_keywords
            .iter()
            .any(|keyword| contains_keyword(&text, keyword));
        let breach_priority = event
            .metrics
            .as_ref()
            .and_then(|metrics| self.thresholds.worst(metrics));

        let alerts: Vec<ClassifiedAlert> = self
            .destinations
            .iter()
            .filter_map(|matcher| {
                let keyword = matcher
                    .keywords
                    .iter()
                    .find(|keyword| contains_keyword(&text, keyword))?;

                let priority = self.resolve_priority(matcher, urgent, breach_priority);
                Some(ClassifiedAlert {
                    destination: matcher.destination,
                    priority,
                    matched_keyword: keyword.clone(),
                    department,
                    source_event: event.clone(),
                })
            })
            .collect();

        if alerts.is_empty() {
            debug!(message = %event.raw_message, "Alert matched no destination, dropped");
        }

        alerts
    }

    fn resolve_priority(
        &self,
        matcher: &DestinationMatcher,
        urgent: bool,
        breach_priority: Option<Priority>,
    ) -> Priority {
        if urgent {
            return Priority::High;
        }
        if self.high_priority_destinations.contains(&matcher.destination) {
            return Priority::High;
        }
        if let Some(priority) = breach_priority {
            return priority;
        }
        matcher.default_priority
    }

    fn match_department(&self, text: &str) -> Department {
        self.departments
            .iter()
            .find(|matcher| {
                matcher
                    .keywords
                    .iter()
                    .any(|keyword| contains_keyword(text, keyword))
            })
            .map(|matcher| matcher.department)
            .unwrap_or(Department::Unknown)
    }
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default(), &ThresholdConfig::default())
    }
}
