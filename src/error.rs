//! 统一错误处理模块
//!
//! 桥接层的错误分为三层：
//!
//! - **加载错误** (`LoadError`): 配置无效、运行时垫片缺失、模块获取/实例化失败、模块启动崩溃
//! - **调用错误** (`BridgeError`): 引擎返回的错误、调用约定或编码不匹配
//! - **编码错误** (`CodecError`): 线上值格式错误
//!
//! 所有错误都直接传递给调用方，桥接层不做重试。

use crate::config::ConfigError;
use crate::surface::Operation;
use thiserror::Error;

/// 模块加载错误，对一次加载尝试是终结性的
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Runtime shim `{0}` is not available")]
    ShimMissing(String),

    #[error("Failed to fetch module {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to instantiate module: {0}")]
    Instantiate(String),

    #[error("Module execution failed: {0}")]
    ModuleExecution(#[from] ExecutionFailure),

    #[error("Published surface is missing operations: {}", .0.join(", "))]
    IncompleteSurface(Vec<&'static str>),

    #[error("A module load is already in flight")]
    AlreadyLoading,

    #[error("Invalid bridge configuration: {0}")]
    Config(#[from] ConfigError),
}

/// 模块后台执行任务的异常结束
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("module crashed: {0}")]
    Crashed(String),

    #[error("module panicked: {0}")]
    Panicked(String),

    #[error("module exited before publishing its surface")]
    ExitedBeforeReady,
}

/// 引擎操作返回的错误值（非法走法、非当前回合玩家等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct EngineError {
    pub operation: Operation,
    pub message: String,
}

/// 调用引擎操作时的错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Contract mismatch in {operation}: {detail}")]
    ContractMismatch {
        operation: Operation,
        detail: String,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Module is no longer running")]
    Terminated,
}

impl BridgeError {
    /// 引擎错误时返回其内容
    pub fn as_engine_error(&self) -> Option<&EngineError> {
        match self {
            BridgeError::Engine(err) => Some(err),
            _ => None,
        }
    }
}

/// 线上值格式错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown move type: {0}")]
    UnknownMoveType(String),

    #[error("malformed point: {0}")]
    MalformedPoint(String),

    #[error("malformed move: {0}")]
    MalformedMove(String),

    #[error("invalid player: {0}")]
    InvalidPlayer(i64),

    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
}

pub type LoadResult<T> = Result<T, LoadError>;
pub type BridgeResult<T> = Result<T, BridgeError>;
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let engine_err = EngineError {
            operation: Operation::MakeMove,
            message: "not your turn".to_string(),
        };
        let err: BridgeError = engine_err.clone().into();
        assert_eq!(err.as_engine_error(), Some(&engine_err));

        let load_err: LoadError = ExecutionFailure::ExitedBeforeReady.into();
        assert!(matches!(
            load_err,
            LoadError::ModuleExecution(ExecutionFailure::ExitedBeforeReady)
        ));
    }

    #[test]
    fn test_error_display() {
        let err = EngineError {
            operation: Operation::MakeMove,
            message: "illegal move".to_string(),
        };
        assert_eq!(err.to_string(), "makeMove failed: illegal move");

        let err = LoadError::IncompleteSurface(vec!["pastTurns", "currentTurn"]);
        assert_eq!(
            err.to_string(),
            "Published surface is missing operations: pastTurns, currentTurn"
        );
    }
}
