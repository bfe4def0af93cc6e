use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::readiness::ReadinessStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 就绪检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// 检测方式
    pub mode: ReadinessMode,

    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

impl_default!(ReadinessConfig {
    mode: ReadinessMode::Poll,
    poll_interval_ms: 100,
});

/// 检测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessMode {
    /// 定时轮询
    Poll,
    /// 发布通知
    Signal,
}

impl ReadinessConfig {
    pub fn strategy(&self) -> ReadinessStrategy {
        match self.mode {
            ReadinessMode::Poll => ReadinessStrategy::Poll {
                interval: Duration::from_millis(self.poll_interval_ms),
            },
            ReadinessMode::Signal => ReadinessStrategy::Signal,
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mode == ReadinessMode::Poll && self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
