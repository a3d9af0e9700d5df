use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// 冷却存储接口
///
/// 同一个键两次放行之间至少间隔一个冷却窗口。多实例部署时可以用外部
/// 同步的键值存储实现该接口。
pub trait CooldownStore: Send + Sync {
    /// 允许发送时记录时间并返回 `true`，否则返回 `false` 且不修改状态
    fn check_and_record(&mut self, key: &str, now: DateTime<Utc>) -> bool;

    /// 清理已经过期的记录，不影响放行结果
    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize;
}

/// 进程内冷却缓存，重启后清空
#[derive(Debug, Clone)]
pub struct CooldownCache {
    last_sent_at: HashMap<String, DateTime<Utc>>,
    window: Duration,
}

impl CooldownCache {
    pub fn new(window: Duration) -> Self {
        Self {
            last_sent_at: HashMap::new(),
            window,
        }
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::minutes(minutes as i64))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_sent_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last_sent_at.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_sent_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent_at.is_empty()
    }
}

impl CooldownStore for CooldownCache {
    fn check_and_record(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_sent_at.get(key) {
            let elapsed = now - *last;
            if elapsed < self.window {
                debug!(
                    key = %key,
                    elapsed_secs = elapsed.num_seconds(),
                    "Alert suppressed by cooldown"
                );
                return false;
            }
        }

        self.last_sent_at.insert(key.to_string(), now);
        true
    }

    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.last_sent_at.len();
        let window = self.window;
        self.last_sent_at.retain(|_, last| now - *last < window);
        let removed = before - self.last_sent_at.len();
        if removed > 0 {
            debug!(removed, remaining = self.last_sent_at.len(), "Pruned cooldown entries");
        }
        removed
    }
}
