use crate::config::{BatchPollingConfig, BatchingConfig, PollingConfig};
use std::time::Duration;

/// 單一 job 的輪詢預算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// 狀態查詢次數上限，用完即逾時
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            interval: Duration::from_millis(2000),
        }
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: Duration::from_millis(config.interval_ms),
        }
    }
}

/// 批次共用 ticker 的輪詢預算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// 同一個 tick 內相鄰兩次狀態查詢的間隔
    pub inter_check_delay: Duration,
}

impl Default for BatchPollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            interval: Duration::from_millis(5000),
            inter_check_delay: Duration::from_millis(200),
        }
    }
}

impl From<&BatchPollingConfig> for BatchPollPolicy {
    fn from(config: &BatchPollingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: Duration::from_millis(config.interval_ms),
            inter_check_delay: Duration::from_millis(config.inter_check_delay_ms),
        }
    }
}

/// 分批送出之間的線性遞增延遲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub step: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(3000),
            step: Duration::from_millis(1000),
            max: Duration::from_millis(10_000),
        }
    }
}

impl From<&BatchingConfig> for BackoffPolicy {
    fn from(config: &BatchingConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            step: Duration::from_millis(config.delay_step_ms),
            max: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl BackoffPolicy {
    /// `index` 是剛送出的批次（從 0 開始）
    pub fn delay_for(&self, index: usize) -> Duration {
        let steps = u32::try_from(index).unwrap_or(u32::MAX);
        let delay = self
            .step
            .checked_mul(steps)
            .and_then(|extra| self.base.checked_add(extra))
            .unwrap_or(self.max);
        delay.min(self.max)
    }
}
