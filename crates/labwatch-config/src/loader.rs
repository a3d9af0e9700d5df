use config::{Config, Environment, File, FileFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::settings::LabwatchConfig;

/// 冷却和升级时长的上限（一年）
pub const MAX_WINDOW_MINUTES: u64 = 525_600;

/// 环境变量前缀，例如 `LABWATCH__MONITORING__ALERT_COOLDOWN_MINUTES=5`
pub const ENV_PREFIX: &str = "LABWATCH";

/// 配置加载器
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    /// 从指定 TOML 文件加载，文件不存在时使用默认值
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            use_env: true,
        }
    }

    /// 仅使用默认值和环境变量
    pub fn defaults() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    /// 关闭环境变量覆盖
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// 加载并校验配置
    pub fn load(&self) -> Result<LabwatchConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.path {
            if path.exists() {
                let name = path
                    .to_str()
                    .ok_or_else(|| ConfigError::invalid("config path is not valid UTF-8"))?;
                builder = builder.add_source(File::new(name, FileFormat::Toml));
                info!(path = %path.display(), "Loading configuration file");
            } else {
                debug!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        if self.use_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: LabwatchConfig = builder.build()?.try_deserialize()?;
        validate(&config)?;
        Ok(config)
    }
}

/// 把当前配置渲染为 TOML
pub fn render(config: &LabwatchConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// 校验配置
pub fn validate(config: &LabwatchConfig) -> Result<()> {
    let monitoring = &config.monitoring;
    if monitoring.monitoring_interval_seconds == 0 {
        return Err(ConfigError::invalid(
            "monitoring_interval_seconds must be greater than 0",
        ));
    }
    if monitoring.max_consecutive_cycle_failures_before_reload == 0 {
        return Err(ConfigError::invalid(
            "max_consecutive_cycle_failures_before_reload must be greater than 0",
        ));
    }
    for (name, value) in [
        ("alert_cooldown_minutes", monitoring.alert_cooldown_minutes),
        ("incident_escalation_minutes", monitoring.incident_escalation_minutes),
    ] {
        if value > MAX_WINDOW_MINUTES {
            return Err(ConfigError::invalid(format!(
                "{} must be at most {}, got {}",
                name, MAX_WINDOW_MINUTES, value
            )));
        }
    }

    let thresholds = &config.thresholds;
    for (name, value) in [
        ("performance_score_threshold", thresholds.performance_score_threshold),
        ("qc_completion_threshold", thresholds.qc_completion_threshold),
    ] {
        if !(0.0..100.0).contains(&value) {
            return Err(ConfigError::invalid(format!(
                "{} must be within [0, 100), got {}",
                name, value
            )));
        }
    }
    for (name, value) in [
        ("error_rate_threshold", thresholds.error_rate_threshold),
        ("break_time_threshold_minutes", thresholds.break_time_threshold_minutes),
    ] {
        if value <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "{} must be greater than 0, got {}",
                name, value
            )));
        }
    }
    if thresholds.escalation_factor <= 1.0 {
        return Err(ConfigError::invalid(format!(
            "escalation_factor must be greater than 1, got {}",
            thresholds.escalation_factor
        )));
    }

    let classifier = &config.classifier;
    if classifier.urgent_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::invalid("urgent_keywords contains an empty keyword"));
    }
    let mut seen = HashSet::new();
    for rule in &classifier.destinations {
        if !seen.insert(rule.destination) {
            return Err(ConfigError::invalid(format!(
                "duplicate destination rule: {}",
                rule.destination
            )));
        }
        if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid(format!(
                "destination {} needs non-empty keywords",
                rule.destination
            )));
        }
    }
    for rule in &classifier.departments {
        if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::invalid(format!(
                "department {} needs non-empty keywords",
                rule.department
            )));
        }
    }

    let mut ids = HashSet::new();
    for source in &config.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::invalid("source id must not be empty"));
        }
        if !ids.insert(source.id.as_str()) {
            return Err(ConfigError::invalid(format!("duplicate source id: {}", source.id)));
        }
    }

    Ok(())
}
