/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod contract;
pub mod readiness;

pub use contract::ContractConfig;
pub use readiness::{ReadinessConfig, ReadinessMode};

use crate::impl_default;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接层主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 模块配置
    #[serde(default)]
    pub module: ModuleConfig,

    /// 引擎契约配置
    #[serde(default)]
    pub contract: ContractConfig,

    /// 就绪检测配置
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 无法解析的值会被忽略并记录警告。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SCOUTS_MODULE_PATH") {
            self.module.path = val;
        }
        if let Ok(val) = env::var("SCOUTS_WIRE_GENERATION") {
            match val.parse() {
                Ok(generation) => self.contract.generation = generation,
                Err(err) => tracing::warn!(target: "config", %err, "ignoring SCOUTS_WIRE_GENERATION"),
            }
        }
        if let Ok(val) = env::var("SCOUTS_CALL_CONVENTION") {
            match val.parse() {
                Ok(convention) => self.contract.convention = convention,
                Err(err) => tracing::warn!(target: "config", %err, "ignoring SCOUTS_CALL_CONVENTION"),
            }
        }
        if let Ok(val) = env::var("SCOUTS_POLL_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(interval) if interval > 0 => self.readiness.poll_interval_ms = interval,
                _ => tracing::warn!(target: "config", value = %val, "ignoring SCOUTS_POLL_INTERVAL_MS"),
            }
        }
        if let Ok(val) = env::var("SCOUTS_LOG_LEVEL") {
            if let Some(level) = LogLevel::from_name(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.module.validate()?;
        self.readiness.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./scouts.toml
    /// 2. ./scouts.json
    /// 3. ~/.config/scouts_bridge/config.toml
    /// 4. 使用默认配置
    ///
    /// 最后应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = Self::discover();
        config.apply_env_overrides();
        config
    }

    fn discover() -> Self {
        if let Ok(config) = Self::from_toml_file("scouts.toml") {
            tracing::info!(target: "config", "Loaded config from scouts.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("scouts.json") {
            tracing::info!(target: "config", "Loaded config from scouts.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("scouts_bridge")
                .join("config.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", path = %config_path.display(), "Loaded config");
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 模块配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// 模块路径
    pub path: String,

    /// 宿主支持时优先流式编译
    pub prefer_streaming: bool,
}

impl_default!(ModuleConfig {
    path: "dist/main.wasm".to_string(),
    prefer_streaming: true,
});

impl ModuleConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Module path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出模块路径（target）
    pub with_target: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    with_target: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}
