//! 日志初始化
//!
//! 使用 tracing 日志框架。`RUST_LOG` 环境变量优先，未设置时使用配置中的级别。

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 初始化日志系统
///
/// 重复调用是安全的，已经安装过全局订阅者时保留原有订阅者并记录一条调试日志。
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init();
    match installed {
        Ok(()) => {
            tracing::debug!(target: "bridge", level = config.level.as_str(), "logging initialized")
        }
        Err(err) => {
            tracing::debug!(target: "bridge", %err, "global subscriber already installed, keeping it")
        }
    }
}
