//! 调用编组与解包
//!
//! 引擎有两种调用约定：
//!
//! - **direct_async**: 每个操作返回一个 future，成功时给出结果，失败时给出错误值
//! - **tuple**: 每个操作同步返回二元组 `[value, error]`，`error` 为空表示成功
//!
//! [`Marshaller::unwrap`] 是唯一的转换点，调用方只会看到 `Result`，
//! 原始二元组不会越过这一层。

use crate::error::{BridgeError, BridgeResult, EngineError};
use crate::surface::{ModuleSurface, Operation};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 引擎的调用约定，按部署配置选定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallConvention {
    DirectAsync,
    Tuple,
}

impl CallConvention {
    pub const fn name(self) -> &'static str {
        match self {
            CallConvention::DirectAsync => "direct_async",
            CallConvention::Tuple => "tuple",
        }
    }
}

impl fmt::Display for CallConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CallConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct_async" | "async" => Ok(CallConvention::DirectAsync),
            "tuple" => Ok(CallConvention::Tuple),
            other => Err(format!("unknown call convention `{other}`")),
        }
    }
}

/// 引擎操作的原始返回
pub enum Invocation {
    /// direct_async 约定：稍后完成，`Err` 中是引擎抛出的错误值
    Deferred(BoxFuture<'static, Result<Value, Value>>),
    /// tuple 约定：`[value, error-or-null]`
    Tuple(Value),
}

impl Invocation {
    pub fn resolved(value: Value) -> Self {
        Invocation::Deferred(futures::future::ready(Ok(value)).boxed())
    }

    pub fn rejected(error: impl Into<Value>) -> Self {
        Invocation::Deferred(futures::future::ready(Err(error.into())).boxed())
    }

    pub fn tuple(value: Value, error: Option<Value>) -> Self {
        Invocation::Tuple(Value::Array(vec![value, error.unwrap_or(Value::Null)]))
    }

    /// 按约定包装一次同步计算的结果
    pub fn from_result(convention: CallConvention, result: Result<Value, String>) -> Self {
        match (convention, result) {
            (CallConvention::DirectAsync, Ok(value)) => Invocation::resolved(value),
            (CallConvention::DirectAsync, Err(error)) => Invocation::rejected(error),
            (CallConvention::Tuple, Ok(value)) => Invocation::tuple(value, None),
            (CallConvention::Tuple, Err(error)) => {
                Invocation::tuple(Value::Null, Some(Value::String(error)))
            }
        }
    }

    const fn shape(&self) -> CallConvention {
        match self {
            Invocation::Deferred(_) => CallConvention::DirectAsync,
            Invocation::Tuple(_) => CallConvention::Tuple,
        }
    }
}

/// 把模块的原始调用转换为 `Result`
///
/// 内部的互斥锁保证同一时间只有一个调用进入引擎。
pub struct Marshaller {
    surface: Arc<dyn ModuleSurface>,
    convention: CallConvention,
    gate: Mutex<()>,
}

impl Marshaller {
    pub fn new(surface: Arc<dyn ModuleSurface>, convention: CallConvention) -> Self {
        Self {
            surface,
            convention,
            gate: Mutex::new(()),
        }
    }

    pub fn convention(&self) -> CallConvention {
        self.convention
    }

    /// 调用一个引擎操作并解包结果
    pub async fn unwrap(&self, operation: Operation, args: Vec<Value>) -> BridgeResult<Value> {
        let _guard = self.gate.lock().await;
        tracing::trace!(target: "marshal", %operation, ?args, "invoking engine");

        let invocation = self.surface.invoke(operation, args);
        let result = match (self.convention, invocation) {
            (CallConvention::DirectAsync, Invocation::Deferred(pending)) => pending
                .await
                .map_err(|error| engine_error(operation, error).into()),
            (CallConvention::Tuple, Invocation::Tuple(raw)) => split_tuple(operation, raw),
            (expected, other) => Err(BridgeError::ContractMismatch {
                operation,
                detail: format!(
                    "expected a {expected} result, engine answered with {}",
                    other.shape()
                ),
            }),
        };

        if let Err(err) = &result {
            tracing::debug!(target: "marshal", %operation, error = %err, "engine call failed");
        }
        result
    }
}

fn split_tuple(operation: Operation, raw: Value) -> BridgeResult<Value> {
    let items = match raw {
        Value::Array(items) => items,
        other => {
            return Err(BridgeError::ContractMismatch {
                operation,
                detail: format!("expected a [value, error] tuple, got {other}"),
            })
        }
    };
    let [value, error]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
        BridgeError::ContractMismatch {
            operation,
            detail: format!("expected a 2-element tuple, got {} elements", items.len()),
        }
    })?;

    if error.is_null() {
        Ok(value)
    } else {
        Err(engine_error(operation, error).into())
    }
}

fn engine_error(operation: Operation, error: Value) -> EngineError {
    let message = match &error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    };
    EngineError { operation, message }
}
